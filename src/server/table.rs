//! Server-side Connection Table: one entry per connection id, created on
//! POST and removed on close. Ids are never reused once they have ever
//! lived (SPEC_FULL.md §3, §4.1).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// The live half of a tunneled connection. `read`/`write` are each behind
/// their own lock so a GET and a PUT for the same id can run concurrently
/// while same-direction calls against the same id still serialize.
pub struct Tunnel {
    pub read: Mutex<OwnedReadHalf>,
    pub write: Mutex<OwnedWriteHalf>,
}

impl Tunnel {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            read: Mutex::new(read),
            write: Mutex::new(write),
        }
    }
}

#[derive(Default)]
pub struct ConnectionTable {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    open: HashMap<String, Arc<Tunnel>>,
    ever_used: HashSet<String>,
}

pub enum OpenOutcome {
    /// The id was fresh; the tunnel is now in the table.
    Opened(Arc<Tunnel>),
    /// The id is live or was closed; §4.1 rejects this with 409.
    Conflict,
}

impl ConnectionTable {
    /// Inserts a new tunnel for `id`, unless `id` has ever been used.
    pub async fn open(&self, id: &str, stream: TcpStream) -> OpenOutcome {
        let mut inner = self.inner.lock().await;
        if inner.ever_used.contains(id) {
            return OpenOutcome::Conflict;
        }
        let tunnel = Arc::new(Tunnel::new(stream));
        inner.ever_used.insert(id.to_owned());
        inner.open.insert(id.to_owned(), tunnel.clone());
        OpenOutcome::Opened(tunnel)
    }

    /// Looks up the tunnel for a live id. Returns `None` for unknown or
    /// already-closed ids (§4.1 state machine: GET/PUT on `Absent` is 404).
    pub async fn get(&self, id: &str) -> Option<Arc<Tunnel>> {
        self.inner.lock().await.open.get(id).cloned()
    }

    /// Removes `id` from the live set. Idempotent: closing twice, or
    /// closing an id that was never opened, is a no-op (DELETE is
    /// idempotent per §4.1). The id stays in `ever_used` so it can never
    /// be reopened.
    pub async fn remove(&self, id: &str) -> Option<Arc<Tunnel>> {
        self.inner.lock().await.open.remove(id)
    }

    /// Drops every live tunnel, e.g. on server shutdown. Destination
    /// sockets are closed as their `Arc<Tunnel>` drops once in-flight
    /// handlers finish with them.
    pub async fn close_all(&self) {
        self.inner.lock().await.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = TcpStream::connect(addr);
        let (accept, connect) = tokio::join!(listener.accept(), connect);
        (accept.unwrap().0, connect.unwrap())
    }

    #[tokio::test]
    async fn open_then_reopen_same_id_is_conflict() {
        let table = ConnectionTable::default();
        let (a, _keep) = connected_pair().await;
        let (b, _keep2) = connected_pair().await;

        assert!(matches!(table.open("x", a).await, OpenOutcome::Opened(_)));
        assert!(matches!(table.open("x", b).await, OpenOutcome::Conflict));
    }

    #[tokio::test]
    async fn reopen_after_close_is_still_conflict() {
        let table = ConnectionTable::default();
        let (a, _keep) = connected_pair().await;
        let (b, _keep2) = connected_pair().await;

        table.open("x", a).await;
        table.remove("x").await;
        assert!(matches!(table.open("x", b).await, OpenOutcome::Conflict));
        assert!(table.get("x").await.is_none());
    }

    #[tokio::test]
    async fn distinct_ids_are_isolated() {
        let table = ConnectionTable::default();
        let (a, _keep) = connected_pair().await;
        let (b, _keep2) = connected_pair().await;

        table.open("a", a).await;
        table.open("b", b).await;
        assert!(table.get("a").await.is_some());
        assert!(table.get("b").await.is_some());
        table.remove("a").await;
        assert!(table.get("a").await.is_none());
        assert!(table.get("b").await.is_some());
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let table = ConnectionTable::default();
        assert!(table.get("nope").await.is_none());
        assert!(table.remove("nope").await.is_none());
    }
}
