//! 工具执行上下文：请求级工作单元（scope）与进程级共享资源
//!
//! - UnitOfWork：每次调度前 begin，成功 commit、失败 rollback，之后释放；只有 ToolRegistry 持有其生命周期。
//! - SharedResources：启动时显式构造的单例客户端（按类型存取）；需要延迟初始化时用 LazyResource，
//!   并发首次访问下保证最多构造一次。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

/// 请求级工作单元（如数据库事务句柄）
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> Result<(), String>;

    async fn rollback(self: Box<Self>) -> Result<(), String>;

    /// 供处理器向下转型取得具体句柄
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 工作单元工厂：每次工具调度打开一个新的 scope
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, String>;
}

/// 空工作单元：无外部事务的部署使用
#[derive(Debug, Default)]
pub struct NoopUnitOfWork;

#[async_trait]
impl UnitOfWork for NoopUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), String> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), String> {
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default)]
pub struct NoopUnitOfWorkFactory;

#[async_trait]
impl UnitOfWorkFactory for NoopUnitOfWorkFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, String> {
        Ok(Box::new(NoopUnitOfWork))
    }
}

/// 延迟初始化的单例：首次 get_or_try_init 时构造，之后复用
pub struct LazyResource<T> {
    cell: OnceCell<Arc<T>>,
}

impl<T> Default for LazyResource<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> LazyResource<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

/// 共享资源表：按类型存放只读单例，启动时注入 ToolRegistry
#[derive(Default)]
pub struct SharedResources {
    items: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SharedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.insert(value);
        self
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.items.insert(TypeId::of::<T>(), value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.items
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 单次工具调度的执行上下文
pub struct ExecutionContext {
    pub user_id: String,
    pub call_id: String,
    pub language: String,
    resources: Arc<SharedResources>,
    unit: Option<Box<dyn UnitOfWork>>,
}

impl ExecutionContext {
    pub fn new(
        user_id: impl Into<String>,
        call_id: impl Into<String>,
        language: impl Into<String>,
        resources: Arc<SharedResources>,
        unit: Box<dyn UnitOfWork>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            call_id: call_id.into(),
            language: language.into(),
            resources,
            unit: Some(unit),
        }
    }

    pub fn resource<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resources.get::<T>()
    }

    /// 取得具体类型的工作单元句柄（如事务），类型不符返回 None
    pub fn unit_of_work<T: 'static>(&mut self) -> Option<&mut T> {
        self.unit
            .as_mut()
            .and_then(|u| u.as_any_mut().downcast_mut::<T>())
    }

    pub(crate) fn take_unit(&mut self) -> Option<Box<dyn UnitOfWork>> {
        self.unit.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Client {
        id: usize,
    }

    #[test]
    fn test_shared_resources_by_type() {
        let resources = SharedResources::new().with(Arc::new(Client { id: 7 }));
        assert_eq!(resources.get::<Client>().map(|c| c.id), Some(7));
        assert!(resources.get::<String>().is_none());
    }

    #[tokio::test]
    async fn test_lazy_resource_initializes_once_under_contention() {
        let lazy = Arc::new(LazyResource::<Client>::new());
        let built = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let lazy = lazy.clone();
            let built = built.clone();
            handles.push(tokio::spawn(async move {
                lazy.get_or_try_init(|| async {
                    let id = built.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    Ok::<_, String>(Client { id })
                })
                .await
                .map(|c| c.id)
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(0));
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_lazy_resource_retries_after_failed_init() {
        let lazy = LazyResource::<Client>::new();
        let first = lazy
            .get_or_try_init(|| async { Err::<Client, _>("rpc down".to_string()) })
            .await;
        assert!(first.is_err());
        assert!(lazy.get().is_none());
        let second = lazy
            .get_or_try_init(|| async { Ok::<_, String>(Client { id: 1 }) })
            .await;
        assert_eq!(second.map(|c| c.id), Ok(1));
    }

    #[test]
    fn test_unit_of_work_downcast() {
        let mut ctx = ExecutionContext::new(
            "u1",
            "call_1",
            "en",
            Arc::new(SharedResources::new()),
            Box::new(NoopUnitOfWork),
        );
        assert!(ctx.unit_of_work::<NoopUnitOfWork>().is_some());
        assert!(ctx.unit_of_work::<String>().is_none());
    }
}
