pub mod config;
pub mod crossfade;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod generator;
pub mod intensity;
pub mod layer;
pub mod master;
pub mod mode;
pub mod note;
#[cfg(feature = "device")]
pub mod output;
pub mod pattern;
pub mod player;
pub mod renderer;
pub mod scheduler;
pub mod transport;

pub use config::EngineConfig;
pub use engine::{EngineState, SoundscapeEngine};
pub use error::AmbientError;
pub use layer::LayerId;
pub use mode::{ModeConfig, ModeId};
pub use player::{Confirmation, Player, RenderHandle};

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the ambient-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(err: AmbientError) -> JsValue {
    JsValue::from_str(&format!("{}: {err}", err.error_code()))
}

/// WASM-exposed: the mode catalog as an array of plain objects.
#[wasm_bindgen(js_name = modeCatalog)]
pub fn mode_catalog() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(mode::catalog()).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed engine for an AudioWorklet host.
///
/// The worklet calls `render` with its interleaved output block; the page
/// drives `setMode`/`setPlaying` and polls `audioIntensity` for visuals.
#[wasm_bindgen]
pub struct AmbientSoundscape {
    engine: SoundscapeEngine,
}

#[wasm_bindgen]
impl AmbientSoundscape {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, mode: &str) -> Result<AmbientSoundscape, JsValue> {
        let config = EngineConfig {
            sample_rate,
            default_mode: mode.to_string(),
            ..EngineConfig::default()
        };
        let mut engine = SoundscapeEngine::new(config).map_err(js_error)?;
        engine.initialize().map_err(js_error)?;
        Ok(AmbientSoundscape { engine })
    }

    #[wasm_bindgen(js_name = setMode)]
    pub fn set_mode(&mut self, mode: &str) {
        self.engine.set_mode(mode);
    }

    #[wasm_bindgen(js_name = setPlaying)]
    pub fn set_playing(&mut self, playing: bool) -> Result<(), JsValue> {
        self.engine.set_playing(playing).map_err(js_error)
    }

    /// Fill `out` with interleaved stereo.
    pub fn render(&mut self, out: &mut [f32]) {
        self.engine.render(out);
    }

    #[wasm_bindgen(js_name = audioIntensity)]
    pub fn audio_intensity(&self) -> f32 {
        self.engine.audio_intensity()
    }

    pub fn ready(&self) -> bool {
        self.engine.ready()
    }

    pub fn mode(&self) -> String {
        self.engine.mode().to_string()
    }

    pub fn dispose(&mut self) {
        self.engine.dispose();
    }
}
