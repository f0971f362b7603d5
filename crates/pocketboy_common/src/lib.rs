pub mod app;
pub mod key;

pub use app::App;
pub use key::Key;
