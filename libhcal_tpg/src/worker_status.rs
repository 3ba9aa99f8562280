#[derive(Debug, Clone, Default)]
pub enum BarColor {
    #[default]
    CYAN,
    GREEN,
}

/// Progress report of one emulation worker
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub events_done: usize,
    pub worker_id: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, events_done: usize, worker_id: usize, color: BarColor) -> Self {
        Self {
            progress,
            events_done,
            worker_id,
            color,
        }
    }
}
