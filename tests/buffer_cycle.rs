use std::ptr;
use std::time::Duration;

use omxil_mf::{registry, Command, State};
use rand::Rng;

mod util;

use util::{app, init, register_components, TestCallbacks};

const LONG: Duration = Duration::from_secs(2);

// One 4096-byte buffer registered on the input port, cycled through the
// component one hundred times. Every submission must come back, in
// order, carrying the app-private label it was submitted with.
#[test]
fn hundred_empty_buffer_cycles() {
    init();
    register_components();

    let comp = registry::global().make_component(util::RENDERER).unwrap();
    let cbs = TestCallbacks::new();
    comp.set_callbacks(cbs.clone());

    comp.send_command(Command::StateSet(State::Idle)).unwrap();
    let header = comp.allocate_buffer(0, ptr::null_mut(), 4096).unwrap();
    assert!(cbs.wait_cmd_complete(Command::StateSet(State::Idle), LONG));
    util::transition(&comp, &cbs, State::Executing, LONG);

    let mut rng = rand::rng();
    for i in 0..100usize {
        unsafe {
            (*header).offset = 0;
            (*header).filled_len = rng.random_range(1..=4096);
            (*header).app_private = app(i);
        }
        unsafe { comp.empty_this_buffer(header) }.unwrap();
        assert!(
            cbs.wait_empties(i + 1, LONG),
            "missing return for submission {}",
            i
        );
    }

    let recorded = cbs.snapshot();
    assert_eq!(recorded.empties.len(), 100);
    // FIFO return order, labels intact.
    assert_eq!(recorded.empties, (0..100).collect::<Vec<_>>());

    // Quiescent accounting: everything is back with the client.
    let port = comp.port(0).unwrap();
    assert_eq!(port.outstanding_buffers(), 0);
    assert_eq!(port.pending_buffers(), 0);

    util::transition(&comp, &cbs, State::Idle, LONG);
    comp.send_command(Command::StateSet(State::Loaded)).unwrap();
    comp.free_buffer(0, header).unwrap();
    assert!(cbs.wait_cmd_complete(Command::StateSet(State::Loaded), LONG));

    comp.deinit().unwrap();
}

// The consumer zeroes what it reads; a fully consumed buffer returns
// with nothing left in it.
#[test]
fn consumed_buffers_return_empty() {
    init();
    register_components();

    let comp = registry::global().make_component(util::RENDERER).unwrap();
    let cbs = TestCallbacks::new();
    comp.set_callbacks(cbs.clone());

    comp.send_command(Command::StateSet(State::Idle)).unwrap();
    let header = comp.allocate_buffer(0, ptr::null_mut(), 4096).unwrap();
    assert!(cbs.wait_cmd_complete(Command::StateSet(State::Idle), LONG));
    util::transition(&comp, &cbs, State::Executing, LONG);

    unsafe {
        (*header).offset = 0;
        (*header).filled_len = 1234;
        (*header).app_private = app(7);
    }
    unsafe { comp.empty_this_buffer(header) }.unwrap();
    assert!(cbs.wait_empties(1, LONG));
    assert_eq!(unsafe { (*header).filled_len }, 0);

    comp.deinit().unwrap();
}
