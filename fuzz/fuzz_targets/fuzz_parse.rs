#![no_main]

use libfuzzer_sys::fuzz_target;
use stackgp::prg::{Program, ProgramContext};
use std::sync::Arc;

fuzz_target!(|text: &str| {
    if text.len() > 512 {
        return;
    }
    let mut ctx = ProgramContext::with_all_functions();
    ctx.define_variable("x").unwrap();
    ctx.define_variable("y").unwrap();
    let ctx = Arc::new(ctx);

    let Ok(program) = Program::from_expression(Arc::clone(&ctx), text) else {
        return;
    };

    // Whatever parses renders to text that parses again to the same size
    let rendered = program.render_infix().unwrap();
    let again = Program::from_expression(ctx, &rendered)
        .unwrap_or_else(|e| panic!("`{text}` rendered as `{rendered}` failed to parse: {e}"));
    assert_eq!(again.size(), program.size(), "`{text}` -> `{rendered}`");
});
