use std::ptr;
use std::time::Duration;

use omxil_mf::{registry, BufferFlags, Command, State, ALL_PORTS};

mod util;

use util::{app, init, register_components, TestCallbacks, FILTER_IN_PORT, FILTER_OUT_PORT};

const LONG: Duration = Duration::from_secs(2);

fn bring_up_filter() -> (
    omxil_mf::Component,
    std::sync::Arc<TestCallbacks>,
    *mut omxil_mf::BufferHeader,
    *mut omxil_mf::BufferHeader,
) {
    let comp = registry::global().make_component(util::FILTER).unwrap();
    let cbs = TestCallbacks::new();
    comp.set_callbacks(cbs.clone());

    comp.send_command(Command::StateSet(State::Idle)).unwrap();
    let in_header = comp
        .allocate_buffer(FILTER_IN_PORT, ptr::null_mut(), util::FILTER_IN_SIZE)
        .unwrap();
    let out_header = comp
        .allocate_buffer(FILTER_OUT_PORT, ptr::null_mut(), util::FILTER_OUT_SIZE)
        .unwrap();
    assert!(cbs.wait_cmd_complete(Command::StateSet(State::Idle), LONG));
    util::transition(&comp, &cbs, State::Executing, LONG);
    (comp, cbs, in_header, out_header)
}

// Flush with the worker mid-pipeline: it holds the input buffer while
// starving on the output side. After the completion event both queues
// are empty and every buffer is back with the client.
#[test]
fn flush_returns_everything_to_the_client() {
    init();
    register_components();

    let (comp, cbs, in_header, out_header) = bring_up_filter();

    unsafe {
        (*in_header).offset = 0;
        (*in_header).filled_len = 64;
        (*in_header).app_private = app(1);
    }
    unsafe { comp.empty_this_buffer(in_header) }.unwrap();

    // Let the worker pick the submission up; it then starves on the
    // output side, holding the input buffer mid-pipeline.
    let in_port = comp.port(FILTER_IN_PORT).unwrap();
    let deadline = std::time::Instant::now() + LONG;
    while in_port.pending_buffers() > 0 {
        assert!(std::time::Instant::now() < deadline, "worker never popped");
        std::thread::sleep(Duration::from_millis(5));
    }

    comp.send_command(Command::Flush(ALL_PORTS)).unwrap();
    assert!(cbs.wait_cmd_complete(Command::Flush(ALL_PORTS), LONG));

    // Flush completeness: queues drained, nothing outstanding, and the
    // input came back zero-filled.
    assert!(cbs.wait_empties(1, LONG));
    for ix in [FILTER_IN_PORT, FILTER_OUT_PORT] {
        let port = comp.port(ix).unwrap();
        assert_eq!(port.pending_buffers(), 0, "port {} not drained", ix);
        assert_eq!(port.outstanding_buffers(), 0, "port {} still holds", ix);
    }
    assert_eq!(unsafe { (*in_header).filled_len }, 0);

    // Processing resumes after the flush.
    unsafe {
        (*in_header).offset = 0;
        (*in_header).filled_len = 32;
        (*in_header).buffer.write(0xAB);
        (*in_header).flags = BufferFlags::empty();
        (*out_header).offset = 0;
        (*out_header).filled_len = 0;
        (*out_header).app_private = app(2);
    }
    unsafe { comp.empty_this_buffer(in_header) }.unwrap();
    unsafe { comp.fill_this_buffer(out_header) }.unwrap();
    assert!(cbs.wait_fills(1, LONG));
    assert_eq!(cbs.snapshot().fills[0].1[0], 0xAB);

    comp.deinit().unwrap();
}

// Leaving Executing for Idle is the same drain; afterwards submissions
// queue up again because Idle still accepts them.
#[test]
fn executing_to_idle_drains_in_flight_buffers() {
    init();
    register_components();

    let (comp, cbs, in_header, _out_header) = bring_up_filter();

    unsafe {
        (*in_header).offset = 0;
        (*in_header).filled_len = 48;
        (*in_header).app_private = app(9);
    }
    unsafe { comp.empty_this_buffer(in_header) }.unwrap();

    util::transition(&comp, &cbs, State::Idle, LONG);
    assert!(cbs.wait_empties(1, LONG));
    assert_eq!(
        comp.port(FILTER_IN_PORT).unwrap().outstanding_buffers(),
        0
    );

    // Idle accepts submissions; they sit in the dispatch queue until
    // the next transition to Executing.
    unsafe {
        (*in_header).filled_len = 16;
    }
    unsafe { comp.empty_this_buffer(in_header) }.unwrap();
    assert_eq!(comp.port(FILTER_IN_PORT).unwrap().pending_buffers(), 1);

    util::transition(&comp, &cbs, State::Executing, LONG);
    // The queued buffer reaches the worker once it can pair it with an
    // output buffer.
    unsafe {
        (*_out_header).offset = 0;
        (*_out_header).filled_len = 0;
    }
    unsafe { comp.fill_this_buffer(_out_header) }.unwrap();
    assert!(cbs.wait_empties(2, LONG));

    comp.deinit().unwrap();
}

// Disable releases the registered list; enable completes only after
// the client repopulates the port.
#[test]
fn port_disable_enable_cycle() {
    init();
    register_components();

    let (comp, cbs, _in_header, _out_header) = bring_up_filter();

    comp.send_command(Command::PortDisable(FILTER_IN_PORT))
        .unwrap();
    assert!(cbs.wait_cmd_complete(Command::PortDisable(FILTER_IN_PORT), LONG));

    let port = comp.port(FILTER_IN_PORT).unwrap();
    assert!(!port.is_enabled());
    assert!(!port.is_populated());

    // A disabled port refuses submissions outright.
    // (The old header was released with the registered list.)
    comp.send_command(Command::PortEnable(FILTER_IN_PORT))
        .unwrap();
    assert!(!cbs.wait_cmd_complete(Command::PortEnable(FILTER_IN_PORT), Duration::from_millis(200)));

    let fresh = comp
        .allocate_buffer(FILTER_IN_PORT, ptr::null_mut(), util::FILTER_IN_SIZE)
        .unwrap();
    assert!(cbs.wait_cmd_complete(Command::PortEnable(FILTER_IN_PORT), LONG));
    assert!(port.is_enabled());
    assert!(port.is_populated());

    unsafe {
        (*fresh).offset = 0;
        (*fresh).filled_len = 8;
        (*fresh).app_private = app(3);
    }
    unsafe { comp.empty_this_buffer(fresh) }.unwrap();
    unsafe {
        (*_out_header).offset = 0;
        (*_out_header).filled_len = 0;
    }
    unsafe { comp.fill_this_buffer(_out_header) }.unwrap();
    assert!(cbs.wait_fills(1, LONG));

    comp.deinit().unwrap();
}
