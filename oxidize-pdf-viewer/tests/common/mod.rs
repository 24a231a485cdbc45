use std::sync::Arc;

use oxidize_pdf_viewer::testing::{MemoryLoader, MemoryRaster, RecordingSurface};
use oxidize_pdf_viewer::{
    CommandBus, EventSender, Phase, ViewSnapshot, ViewerConfig, ViewerHandle, ViewerInstance,
};

pub struct Spawned {
    pub handle: ViewerHandle,
    pub surface: RecordingSurface,
}

pub fn spawn_viewer(
    bus: &CommandBus,
    id: &str,
    loader: &Arc<MemoryLoader>,
    raster: &Arc<MemoryRaster>,
    events: &EventSender,
) -> Spawned {
    let surface = RecordingSurface::new(1200.0);
    let instance = ViewerInstance::new(
        id.into(),
        ViewerConfig::default(),
        Arc::clone(loader),
        Arc::clone(raster),
        surface.clone(),
        events.clone(),
    )
    .expect("default config is valid");
    let handle = instance.spawn(bus).expect("id is free");
    Spawned { handle, surface }
}

/// Wait until the instance shows `page` with no render outstanding.
pub async fn settled_on(handle: &ViewerHandle, page: u32) -> ViewSnapshot {
    handle
        .wait_for(|snapshot| snapshot.phase == Phase::Ready && snapshot.view.current_page() == page)
        .await
        .expect("instance alive")
}
