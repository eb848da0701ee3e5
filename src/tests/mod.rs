mod cmdline;
mod spawn;

use crate::{Endpoint, Error, Handle, Redirect};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn public_types_are_send_and_sync() {
    assert_send_sync::<Endpoint>();
    assert_send_sync::<Redirect>();
    assert_send_sync::<Handle>();
    assert_send_sync::<Error>();
}
