use std::sync::Arc;

use bytes::Bytes;

use memkv_resp::Reply;

use crate::db::Database;

pub fn exec_ping(_db: &Arc<Database>, _args: &[Bytes]) -> Reply {
    Reply::Pong
}
