use super::*;

fn img(bytes: &[u8]) -> NormalizedImage {
    NormalizedImage {
        width: 2,
        height: 2,
        jpeg: Arc::new(bytes.to_vec()),
    }
}

#[test]
fn identical_images_share_one_id() {
    let mut plan = DocumentPlan::new(PageSize::letter());
    let a = img(b"aaaa");
    let a_copy = img(b"aaaa");
    let b = img(b"bbbb");

    let ia = plan.add_image(&a);
    assert_eq!(plan.add_image(&a), ia);
    assert_eq!(plan.add_image(&a_copy), ia);
    let ib = plan.add_image(&b);
    assert_ne!(ia, ib);
    assert_eq!(plan.images.len(), 2);
    assert_eq!(plan.image(ib), Some(&b));
    assert_eq!(plan.image(ImageId(9)), None);
}

#[test]
fn texts_walk_pages_in_order() {
    let mut plan = DocumentPlan::new(PageSize::letter());
    let text = |s: &str| DrawOp::Text {
        origin: Point::new(0.0, 0.0),
        text: s.to_string(),
        font: Font::Helvetica,
        size: 9.0,
        color: Rgb8::WHITE,
    };
    plan.pages[0].ops.push(text("one"));
    plan.pages[0].ops.push(DrawOp::FillRect {
        rect: Rect::new(0.0, 0.0, 1.0, 1.0),
        color: Rgb8::WHITE,
    });
    plan.pages.push(Page {
        ops: vec![text("two")],
    });
    assert_eq!(plan.texts().collect::<Vec<_>>(), vec!["one", "two"]);
}
