pub mod hover_intent;
pub mod scene;

pub use hover_intent::{
    Hit, HitTester, HoverEvent, HoverIntentHandler, HoverState, INTERACTIVE_LAYER, PointerEvent, PointerPos,
    SceneObject,
};
pub use scene::{HeadlessScene, SceneSink, SceneStats, TrackLine};
