use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::config::{
    MaterialsConfig, SkeletalAnimationConfig, SkeletalMeshConfig, StaticMeshConfig,
};
use crate::data::animation::SkeletalAnimation;
use crate::data::material::Material;
use crate::data::mesh::{SkeletalMesh, StaticMesh};
use crate::data::texture::Texture;
use crate::error::{Error, ErrorKind};
use crate::resource::gltf::asset::GltfAsset;

type Continuation = Box<dyn FnOnce() + Send>;

/// Continuations that must run on the host thread, drained by the host with `pump`.
#[derive(Clone)]
pub struct HostQueue {
    sender: Sender<Continuation>,
    receiver: Receiver<Continuation>,
}

impl Default for HostQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HostQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    fn post(&self, continuation: Continuation) {
        if self.sender.send(continuation).is_err() {
            log::error!("The host queue is closed, dropping a continuation");
        }
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Runs every queued continuation and returns how many ran.
    pub fn pump(&self) -> usize {
        let mut count = 0;
        while let Ok(continuation) = self.receiver.try_recv() {
            continuation();
            count += 1;
        }
        count
    }

    /// Pumps from the host thread until `handle` settles.
    pub fn run_until(&self, handle: &TaskHandle) -> TaskStatus {
        loop {
            let status = handle.status();
            if status.is_settled() {
                return status;
            }
            match self.receiver.recv() {
                Ok(continuation) => continuation(),
                Err(_) => return handle.status(),
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Running on the worker pool.
    Decoding,
    /// Decoded, waiting for the host thread.
    Finalizing,
    Completed,
    /// The document was disposed before the host step ran.
    Cancelled,
    Failed,
}

impl TaskStatus {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }
}

struct Shared {
    status: TaskStatus,
    waker: Option<Waker>,
}

/// Tracks one request; awaiting it yields the final status once the callback has run.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<Mutex<Shared>>,
}

impl TaskHandle {
    fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                status: TaskStatus::Decoding,
                waker: None,
            })),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.shared.lock().status
    }

    /// Blocks until the request settles. Calling this on the host thread deadlocks, since the
    /// host step only runs from `HostQueue::pump`.
    pub fn wait(self) -> TaskStatus {
        pollster::block_on(self)
    }

    fn set_status(&self, status: TaskStatus) {
        let waker = {
            let mut shared = self.shared.lock();
            shared.status = status;
            match status.is_settled() {
                true => shared.waker.take(),
                false => None,
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Future for TaskHandle {
    type Output = TaskStatus;

    fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        let mut shared = self.shared.lock();
        if shared.status.is_settled() {
            return Poll::Ready(shared.status);
        }
        shared.waker = Some(context.waker().clone());
        Poll::Pending
    }
}

/// Decodes on the worker pool, then finalizes and calls back on the host thread.
///
/// The callback always runs exactly once: with the finalized value, or with `None` when decoding
/// or finalizing failed or the document was disposed in the meantime.
pub fn spawn_task<D, T>(
    asset: Arc<GltfAsset>,
    queue: &HostQueue,
    decode: impl FnOnce(&GltfAsset) -> Result<Arc<D>> + Send + 'static,
    finalize: impl FnOnce(Arc<D>) -> Result<T> + Send + 'static,
    callback: impl FnOnce(Option<T>) + Send + 'static,
) -> TaskHandle
where
    D: Send + Sync + 'static,
    T: 'static,
{
    let handle = TaskHandle::new();
    let task = handle.clone();
    let queue = queue.clone();
    let disposed: Arc<AtomicBool> = asset.disposed_flag();

    rayon::spawn(move || {
        let decoded = match disposed.load(Ordering::Acquire) {
            true => None,
            false => Some(decode(&asset)),
        };
        task.set_status(TaskStatus::Finalizing);

        queue.post(Box::new(move || {
            if disposed.load(Ordering::Acquire) {
                log::debug!("Dropping the result of a request on a disposed glTF document");
                callback(None);
                task.set_status(TaskStatus::Cancelled);
                return;
            }

            // decode errors were already recorded by the public load operation
            let Some(Ok(decoded)) = decoded else {
                callback(None);
                task.set_status(TaskStatus::Failed);
                return;
            };

            match finalize(decoded) {
                Ok(value) => {
                    callback(Some(value));
                    task.set_status(TaskStatus::Completed);
                }
                Err(error) => {
                    let error =
                        Error::new(ErrorKind::HostMaterializationFailure, format!("{error:#}"));
                    asset.add_error("Finalize()", error);
                    callback(None);
                    task.set_status(TaskStatus::Failed);
                }
            }
        }));
    });

    handle
}

impl GltfAsset {
    pub fn load_static_mesh_async<T>(
        self: &Arc<Self>,
        queue: &HostQueue,
        mesh_index: usize,
        config: StaticMeshConfig,
        finalize: impl FnOnce(Arc<StaticMesh>) -> Result<T> + Send + 'static,
        callback: impl FnOnce(Option<T>) + Send + 'static,
    ) -> TaskHandle
    where
        T: 'static,
    {
        spawn_task(
            self.clone(),
            queue,
            move |asset| asset.load_static_mesh(mesh_index, &config),
            finalize,
            callback,
        )
    }

    pub fn load_skeletal_mesh_async<T>(
        self: &Arc<Self>,
        queue: &HostQueue,
        mesh_index: usize,
        skin_index: Option<usize>,
        config: SkeletalMeshConfig,
        finalize: impl FnOnce(Arc<SkeletalMesh>) -> Result<T> + Send + 'static,
        callback: impl FnOnce(Option<T>) + Send + 'static,
    ) -> TaskHandle
    where
        T: 'static,
    {
        spawn_task(
            self.clone(),
            queue,
            move |asset| asset.load_skeletal_mesh(mesh_index, skin_index, &config),
            finalize,
            callback,
        )
    }

    pub fn load_skeletal_animation_async<T>(
        self: &Arc<Self>,
        queue: &HostQueue,
        mesh: Arc<SkeletalMesh>,
        animation_index: usize,
        config: SkeletalAnimationConfig,
        finalize: impl FnOnce(Arc<SkeletalAnimation>) -> Result<T> + Send + 'static,
        callback: impl FnOnce(Option<T>) + Send + 'static,
    ) -> TaskHandle
    where
        T: 'static,
    {
        spawn_task(
            self.clone(),
            queue,
            move |asset| asset.load_skeletal_animation(&mesh, animation_index, &config),
            finalize,
            callback,
        )
    }

    pub fn load_material_async<T>(
        self: &Arc<Self>,
        queue: &HostQueue,
        material_index: usize,
        config: MaterialsConfig,
        finalize: impl FnOnce(Arc<Material>) -> Result<T> + Send + 'static,
        callback: impl FnOnce(Option<T>) + Send + 'static,
    ) -> TaskHandle
    where
        T: 'static,
    {
        spawn_task(
            self.clone(),
            queue,
            move |asset| asset.load_material(material_index, &config),
            finalize,
            callback,
        )
    }

    pub fn load_image_async<T>(
        self: &Arc<Self>,
        queue: &HostQueue,
        image_index: usize,
        config: MaterialsConfig,
        finalize: impl FnOnce(Arc<Texture>) -> Result<T> + Send + 'static,
        callback: impl FnOnce(Option<T>) + Send + 'static,
    ) -> TaskHandle
    where
        T: 'static,
    {
        spawn_task(
            self.clone(),
            queue,
            move |asset| asset.load_image(image_index, &config).map(Arc::new),
            finalize,
            callback,
        )
    }
}
