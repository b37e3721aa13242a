use omxil_mf::capi::{OMX_Deinit, OMX_Init, ERROR_NONE};
use omxil_mf::registry;

mod util;

use util::init;

#[test]
fn init_deinit_cycles() {
    init();

    // Paired calls, many times over; the refcount must come back to
    // zero every round.
    for _ in 0..100 {
        assert_eq!(OMX_Init(), ERROR_NONE);
        assert_eq!(OMX_Deinit(), ERROR_NONE);
    }
    assert_eq!(registry::global().init_count(), 0);

    // Nested init holds the registry open until the last deinit.
    assert_eq!(OMX_Init(), ERROR_NONE);
    assert_eq!(OMX_Init(), ERROR_NONE);
    assert_eq!(OMX_Init(), ERROR_NONE);
    assert_eq!(registry::global().init_count(), 3);
    assert_eq!(OMX_Deinit(), ERROR_NONE);
    assert_eq!(OMX_Deinit(), ERROR_NONE);
    assert_eq!(registry::global().init_count(), 1);
    assert_eq!(OMX_Deinit(), ERROR_NONE);
    assert_eq!(registry::global().init_count(), 0);

    // An unbalanced deinit is tolerated.
    assert_eq!(OMX_Deinit(), ERROR_NONE);
    assert_eq!(registry::global().init_count(), 0);
}
