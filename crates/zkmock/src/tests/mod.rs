// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod watchers;

use crate::{Session, Store};

/// Opens a session and waits for it to connect.
async fn connected(store: &Store, connection: &str) -> Session {
    let session = store.create_session(connection).unwrap();
    session.connect().await;
    session
}
