use super::*;

fn clip(begin: u64, end: u64) -> Clip {
    Clip::new(MediaSource::new("synthetic://bars"), begin, end).unwrap()
}

#[test]
fn empty_or_inverted_bounds_are_rejected() {
    assert!(Clip::new(MediaSource::new("synthetic://a"), 5, 5).is_err());
    assert!(Clip::new(MediaSource::new("synthetic://a"), 6, 5).is_err());
}

#[test]
fn split_off_keeps_media_and_gets_new_identity() {
    let parent = clip(10, 60);
    let right = parent.split_off(30, parent.end()).unwrap();
    assert_ne!(right.id(), parent.id());
    assert_eq!(right.source(), parent.source());
    assert_eq!((right.begin(), right.end()), (30, 60));
    assert_eq!(right.length(), 30);
}

#[test]
fn split_off_rejects_points_outside_the_clip() {
    let parent = clip(10, 60);
    assert!(parent.split_off(10, 60).is_err());
    assert!(parent.split_off(60, 70).is_err());
}

#[test]
fn resize_validates_and_keeps_old_bounds_on_error() {
    let mut c = clip(0, 100);
    assert!(c.set_boundaries(50, 40).is_err());
    assert_eq!((c.begin(), c.end()), (0, 100));
    c.set_end(40).unwrap();
    assert_eq!(c.length(), 40);
}
