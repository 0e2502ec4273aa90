//! Level orchestration for the elevator-and-hallway loop: trigger zones,
//! enter/exit dispatch, door and ride sequences, hallway variants and the
//! level phase machine, plus headless stand-ins for the scene, audio, lights
//! and player they drive.

pub mod animation;
pub mod audio;
pub mod door;
pub mod elevator;
pub mod events;
pub mod geometry;
pub mod layout;
pub mod level;
pub mod lighting;
pub mod night_vision;
pub mod phase;
pub mod player;
pub mod scene;
pub mod settings;
pub mod simulation;
pub mod timing;
pub mod transitions;
pub mod variant;
pub mod visibility;
pub mod zones;

pub use door::DoorController;
pub use elevator::Elevator;
pub use events::EventLog;
pub use layout::LevelLayout;
pub use level::{Level, LevelOptions};
pub use phase::{LevelPhase, LevelPhaseController, TransitionReport};
pub use settings::GameSettings;
pub use simulation::{SimulationConfig, SimulationSummary, Strategy};
pub use transitions::{TransitionBus, TransitionWatcher};
pub use variant::VariantSelector;
pub use zones::{ZoneError, ZoneGroup, ZoneUnion};
