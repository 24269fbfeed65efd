//! The database layer's view of a client connection: just the selected
//! database index. Everything socket-shaped (the writer, the pending-writes
//! counter, the close timeout) belongs one layer up, to the code that owns
//! the `TcpStream`.

use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Connection {
    selected_db: AtomicUsize,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            selected_db: AtomicUsize::new(0),
        }
    }

    pub fn selected_db(&self) -> usize {
        self.selected_db.load(Ordering::SeqCst)
    }

    pub fn select_db(&self, index: usize) {
        self.selected_db.store(index, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_db_zero_and_tracks_selection() {
        let conn = Connection::new();
        assert_eq!(conn.selected_db(), 0);
        conn.select_db(3);
        assert_eq!(conn.selected_db(), 3);
    }
}
