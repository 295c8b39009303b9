//! Shared helpers for integration tests: a fake compose service and a mesh
//! wired over the in-process broker.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::post;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tinywins_mesh::agents::{AnalyticsAgent, ContentAgent, PlannerAgent};
use tinywins_mesh::bus::transport::{Connector, LocalBroker};
use tinywins_mesh::bus::{BusBuffers, BusHandle, BusSession, Envelope};
use tinywins_mesh::compose::ComposeProvider;
use tinywins_mesh::config::BusCredentials;
use tinywins_mesh::dispatch::{self, Agent, Dispatcher};
use tinywins_mesh::topics::subscription_for;

pub fn creds() -> BusCredentials {
    BusCredentials {
        host: "local".into(),
        tenant: "test".into(),
        username: "mesh".into(),
        password: "secret".into(),
    }
}

/// Serve `handler` at `POST /v1/content/compose` on an ephemeral port.
pub async fn fake_compose_server<H, T>(handler: H) -> SocketAddr
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    let app = Router::new().route("/v1/content/compose", post(handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A running mesh plus an observer session.
pub struct Mesh {
    pub broker: LocalBroker,
    pub publisher: BusHandle,
    pub observed: mpsc::Receiver<Envelope>,
    pub analytics: Arc<AnalyticsAgent>,
    pub content: Arc<ContentAgent>,
    pub dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    dispatch_task: JoinHandle<()>,
    session: BusSession,
    observer: BusSession,
}

impl Mesh {
    /// Start the three agents, registered after any `leading` ones, and an
    /// observer subscribed to the derived events (rewards, generated content).
    pub async fn start(provider: ComposeProvider, compose_timeout: Duration, leading: Vec<Arc<dyn Agent>>) -> Self {
        let broker = LocalBroker::new("mesh", "secret");
        let mut session = BusSession::connect(Connector::Local(broker.clone()), &creds(), BusBuffers::default())
            .await
            .unwrap();

        let analytics = Arc::new(AnalyticsAgent::new(session.handle()));
        let content = Arc::new(ContentAgent::new(session.handle(), provider, compose_timeout));
        let mut agents = leading;
        let planner: Arc<dyn Agent> = Arc::new(PlannerAgent);
        let content_agent: Arc<dyn Agent> = content.clone();
        let analytics_agent: Arc<dyn Agent> = analytics.clone();
        agents.extend([planner, content_agent, analytics_agent]);
        let dispatcher = Arc::new(Dispatcher::new(agents));

        for kind in dispatcher.kinds() {
            session.subscribe(&subscription_for(kind)).await.unwrap();
        }
        let inbound = session.take_inbound().unwrap();
        let shutdown = CancellationToken::new();
        let dispatch_task = {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { dispatch::run(&dispatcher, inbound, shutdown).await })
        };

        let mut observer = BusSession::connect(Connector::Local(broker.clone()), &creds(), BusBuffers::default())
            .await
            .unwrap();
        observer.subscribe("tinywins/*/reward/unlocked").await.unwrap();
        observer.subscribe("tinywins/*/content/generated").await.unwrap();
        let observed = observer.take_inbound().unwrap();

        Self {
            broker,
            publisher: observer.handle(),
            observed,
            analytics,
            content,
            dispatcher,
            shutdown,
            dispatch_task,
            session,
            observer,
        }
    }

    /// Next observed envelope, failing the test after two seconds.
    pub async fn next(&mut self) -> Envelope {
        tokio::time::timeout(Duration::from_secs(2), self.observed.recv())
            .await
            .expect("timed out waiting for envelope")
            .expect("observer closed")
    }

    /// Assert nothing further arrives within a short grace period.
    pub async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(200), self.observed.recv()).await;
        assert!(extra.is_err(), "unexpected envelope: {:?}", extra.ok().flatten().map(|e| e.topic));
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.dispatch_task.await.unwrap();
        self.content.shutdown().await;
        self.session.close().await;
        self.observer.close().await;
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
