/// Keys a frontend can report to an emulator core.
///
/// This is a deliberately small, frontend-agnostic set: the arrows plus the
/// handful of letter keys the default DMG button mapping uses. Frontends
/// translate their own event types into this enum before calling into
/// [`crate::App::handle_key_event`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    S,
    X,
    Z,
    Enter,
    Space,
    Escape,
}
