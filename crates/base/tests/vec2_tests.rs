use base::Vec2;

#[test]
fn test_area_and_display() {
    let size = Vec2::new(800usize, 600usize);
    assert_eq!(size.area(), 480_000);
    assert_eq!(size.to_string(), "800x600");
}

#[test]
fn test_is_empty() {
    assert!(Vec2::new(0usize, 10).is_empty());
    assert!(Vec2::new(10usize, 0).is_empty());
    assert!(!Vec2::new(1usize, 1).is_empty());
}

#[test]
fn test_contains_region() {
    let size = Vec2::new(8usize, 4usize);
    assert!(size.contains_region(Vec2::new(0, 0), size));
    assert!(size.contains_region(Vec2::new(2, 1), Vec2::new(6, 3)));
    assert!(!size.contains_region(Vec2::new(3, 0), Vec2::new(6, 1)));
    assert!(!size.contains_region(Vec2::new(usize::MAX, 0), Vec2::new(1, 1)));
}
