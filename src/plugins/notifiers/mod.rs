pub mod audio;
pub mod bark;

pub use audio::AudioNotifier;
pub use bark::BarkNotifier;
