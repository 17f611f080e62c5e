use crate::{FrameId, FrameSource, RecordConfig};
use std::{collections::TryReserveError, collections::VecDeque, path::PathBuf};

pub(crate) struct FrameTask {
    pub id: FrameId,
    pub source: Box<dyn FrameSource>,
    pub screenshot_paths: Vec<PathBuf>,
    pub pending_frames: u64,
    pub ready: bool,
}

pub(crate) struct StartTask {
    pub config: RecordConfig,
    /// False when the previous session was never stopped explicitly.
    pub matched_stop: bool,
}

pub(crate) struct StopTask {
    /// False when no session was requested before this stop.
    pub matched_start: bool,
}

pub(crate) enum Task {
    Frame(FrameTask),
    Start(StartTask),
    Stop(StopTask),
}

impl Task {
    pub fn is_ready(&self) -> bool {
        match self {
            Task::Frame(task) => task.ready,
            Task::Start(_) | Task::Stop(_) => true,
        }
    }

    fn frame_id(&self) -> Option<FrameId> {
        match self {
            Task::Frame(task) => Some(task.id),
            _ => None,
        }
    }
}

/// Strict FIFO of worker tasks. A task that is not ready blocks everything behind it.
#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Nothing can run: the queue is empty or its head waits for the producer.
    pub fn is_blocked(&self) -> bool {
        self.tasks.front().is_none_or(|task| !task.is_ready())
    }

    /// Makes room for `additional` tasks so the following pushes cannot fail.
    pub fn reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.tasks.try_reserve(additional)
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn pop_ready(&mut self) -> Option<Task> {
        if self.is_blocked() {
            return None;
        }
        self.tasks.pop_front()
    }

    /// Returns false if the frame already ran or was cancelled.
    pub fn set_ready(&mut self, id: FrameId) -> bool {
        for task in self.tasks.iter_mut() {
            if let Task::Frame(frame) = task
                && frame.id == id
            {
                frame.ready = true;
                return true;
            }
        }
        false
    }

    /// Removes the first (and only) task for frame `id`.
    pub fn remove_frame(&mut self, id: FrameId) -> Option<FrameTask> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.frame_id() == Some(id))?;

        match self.tasks.remove(index) {
            Some(Task::Frame(task)) => Some(task),
            _ => None,
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameData, PixelFormat};

    struct NoPixels;

    impl FrameSource for NoPixels {
        fn frame_data(&self) -> FrameData<'_> {
            FrameData {
                format: PixelFormat::B8G8R8A8,
                width: 0,
                height: 0,
                stride: 0,
                pixels: None,
            }
        }
    }

    fn frame(id: u64) -> Task {
        Task::Frame(FrameTask {
            id: FrameId(id),
            source: Box::new(NoPixels),
            screenshot_paths: vec![],
            pending_frames: 1,
            ready: false,
        })
    }

    fn stop() -> Task {
        Task::Stop(StopTask {
            matched_start: true,
        })
    }

    #[test]
    fn test_unready_head_blocks_queue() {
        let mut queue = TaskQueue::default();
        queue.push(frame(1));
        queue.push(stop());

        assert!(queue.is_blocked());
        assert!(queue.pop_ready().is_none());
        assert_eq!(queue.len(), 2);

        assert!(queue.set_ready(FrameId(1)));
        assert!(!queue.is_blocked());
        assert!(matches!(queue.pop_ready(), Some(Task::Frame(_))));
        assert!(matches!(queue.pop_ready(), Some(Task::Stop(_))));
        assert!(queue.pop_ready().is_none());
        assert!(queue.is_blocked());
    }

    #[test]
    fn test_remove_frame_removes_only_that_task() {
        let mut queue = TaskQueue::default();
        queue.push(frame(1));
        queue.push(stop());
        queue.push(frame(2));
        queue.push(frame(3));

        let removed = queue.remove_frame(FrameId(2)).map(|task| task.id);
        assert_eq!(removed, Some(FrameId(2)));
        assert_eq!(queue.len(), 3);

        assert!(queue.remove_frame(FrameId(2)).is_none());
        assert!(!queue.set_ready(FrameId(2)));
        assert_eq!(queue.len(), 3);

        assert!(queue.set_ready(FrameId(1)));
        assert!(queue.set_ready(FrameId(3)));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_ready())
            .map(|task| task.frame_id())
            .collect();
        assert_eq!(order, vec![Some(FrameId(1)), None, Some(FrameId(3))]);
    }

    #[test]
    fn test_clear() {
        let mut queue = TaskQueue::default();
        queue.reserve(2).unwrap();
        queue.push(stop());
        queue.push(frame(1));

        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.len(), 0);
        assert!(queue.is_blocked());
    }
}
