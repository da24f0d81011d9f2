//! Slidevoice - attach synthesized speech narration to PowerPoint
//! presentations.
//!
//! The crate has two halves. The packaging half opens a `.pptx` archive into
//! memory, reads and edits slide notes, embeds narration audio with its
//! autoplay triggers, and exports a consistent archive back out:
//!
//! ```no_run
//! use slidevoice::pptx::Presentation;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("talk.pptx")?;
//! let mut pres = Presentation::open(&bytes)?;
//!
//! for overview in pres.slide_overviews()? {
//!     println!("slide {}: {}", overview.index + 1, overview.notes);
//! }
//!
//! pres.set_notes(0, "Welcome everyone.")?;
//! let mp3 = std::fs::read("narration.mp3")?;
//! pres.attach_audio(0, &mp3, "audio/mpeg")?;
//!
//! std::fs::write("talk-voiced.pptx", pres.export()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! The speech half drives interchangeable TTS providers behind one
//! normalized model and a strict single-flight controller:
//!
//! ```no_run
//! use std::sync::Arc;
//! use slidevoice::tts::{GenerationController, MemorySettingsStore, ProviderRegistry, SettingsStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Arc::new(MemorySettingsStore::new());
//! settings.set("google_cloud", "api_key", "...");
//!
//! let controller = GenerationController::new(ProviderRegistry::with_default_providers(), settings);
//! let mut events = controller.subscribe();
//!
//! controller.select_provider("google_cloud").await?;
//! let voice = controller.voices().first().cloned().unwrap();
//! controller.generate("Welcome everyone.", &voice.id, &voice.language_code).await?;
//! let clip = controller.last_audio().unwrap();
//! # Ok(())
//! # }
//! ```

/// Open Packaging Convention layer: zip container, parts, relationships,
/// content types
pub mod opc;

/// PresentationML layer: slides, notes, audio embedding
pub mod pptx;

/// Text-to-speech orchestration: providers, voice catalog, generation
/// controller
pub mod tts;

/// Minimal XML element tree used for part mutation
pub mod xml;

// Re-export the main entry points
pub use opc::{OpcError, Package, PackURI};
pub use pptx::{Presentation, PptxError, Slide, SlideOverview};
pub use tts::{
    AudioClip, ControllerEvent, GenerationController, GenerationState, ProviderError,
    ProviderRegistry, TtsError, TtsProvider, Voice,
};
