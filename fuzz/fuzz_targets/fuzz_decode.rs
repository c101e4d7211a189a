#![no_main]

use libfuzzer_sys::fuzz_target;
use stackgp::prg::{Program, ProgramContext};
use std::sync::Arc;

fuzz_target!(|words: Vec<u64>| {
    // Cap buffer length to keep evaluation cheap
    if words.len() > 256 {
        return;
    }
    let mut ctx = ProgramContext::with_all_functions();
    ctx.define_variable("x").unwrap();
    ctx.define_variable("y").unwrap();

    // Corrupt buffers must be rejected, never walked
    let Ok(program) = Program::from_buffer(Arc::new(ctx), words) else {
        return;
    };
    assert_eq!(program.node_len(0).unwrap(), program.len());
    assert_eq!(program.traverse().unwrap().len(), program.size());

    // Evaluation may fail, but only recoverably
    if let Err(e) = program.compute(&[1.5, -2.0]) {
        assert!(!e.is_fatal(), "fatal error on a decoded buffer: {e}");
    }
    let _ = program.render_infix().unwrap();
    let _ = program.render_rpn().unwrap();
});
