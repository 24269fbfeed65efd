use std::sync::Arc;

use bytes::Bytes;

use memkv_aof::Persister;
use memkv_db::{Connection, DbEngine, Server};

fn dummy_factory() -> memkv_aof::DbEngineFactory {
    Arc::new(|| Arc::new(Server::new(1)) as Arc<dyn DbEngine>)
}

#[tokio::test]
async fn replays_appended_commands_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.aof");

    {
        let server: Arc<dyn DbEngine> = Arc::new(Server::new(1));
        let persister = Persister::new(Arc::clone(&server), false, &path, "always", dummy_factory()).await.unwrap();
        persister.save(0, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        drop(persister);
    }

    let server: Arc<dyn DbEngine> = Arc::new(Server::new(1));
    let _persister = Persister::new(Arc::clone(&server), true, &path, "always", dummy_factory()).await.unwrap();
    let conn = Connection::new();
    let reply = server.exec(&conn, &[Bytes::from_static(b"GET"), Bytes::from_static(b"k")]).await;
    assert_eq!(reply, memkv_resp::Reply::Bulk(Bytes::from_static(b"v")));
}

#[tokio::test]
async fn rewrite_compacts_to_current_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.aof");

    let server: Arc<dyn DbEngine> = Arc::new(Server::new(1));
    let persister = Persister::new(Arc::clone(&server), false, &path, "always", dummy_factory()).await.unwrap();
    persister.save(0, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"a"), Bytes::from_static(b"1")]);
    persister.save(0, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"a"), Bytes::from_static(b"2")]);
    persister.save(0, vec![Bytes::from_static(b"SET"), Bytes::from_static(b"b"), Bytes::from_static(b"3")]);

    persister.rewrite().await.unwrap();

    let conn = Connection::new();
    let reply_server: Arc<dyn DbEngine> = Arc::new(Server::new(1));
    let _reload = Persister::new(Arc::clone(&reply_server), true, &path, "always", dummy_factory()).await.unwrap();
    assert_eq!(
        reply_server.exec(&conn, &[Bytes::from_static(b"GET"), Bytes::from_static(b"a")]).await,
        memkv_resp::Reply::Bulk(Bytes::from_static(b"2"))
    );
    assert_eq!(
        reply_server.exec(&conn, &[Bytes::from_static(b"GET"), Bytes::from_static(b"b")]).await,
        memkv_resp::Reply::Bulk(Bytes::from_static(b"3"))
    );
}
