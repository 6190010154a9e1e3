//! Example: Gated Counter
//!
//! Demonstrates register state: a counter that advances by a configured
//! step whenever its enable input is high. Reads inside a call observe
//! the value the register held when the call started.
//!
//! Run with: cargo run --example counter

use indexmap::IndexMap;

use pe_dsl::{compile_to_model, ModelOptions, Value};

const SOURCE: &str = "
    step = Input(Configuration(BitVector(8)));
    enable = Input(BitVector(1));
    count_out = Output(BitVector(8));

    count = Intermediate(Register(BitVector(8)));

    count_out.assign(count);
    count.assign(enable ? count + step : count);
";

fn main() {
    println!("=== Gated Counter Example ===\n");

    let backend = compile_to_model(
        "counter",
        SOURCE,
        ModelOptions {
            validate_inputs: true,
        },
    )
    .unwrap();

    let mut config = IndexMap::new();
    config.insert("step".to_string(), Value::bits(8, 3));
    let mut counter = backend.instantiate(config).unwrap();

    for (cycle, enable) in [1u64, 1, 0, 1, 0, 1].into_iter().enumerate() {
        let mut inputs = IndexMap::new();
        inputs.insert("enable".to_string(), Value::bits(1, enable));
        let out = counter.call(inputs).unwrap();
        println!(
            "cycle {}: enable = {} -> count_out = {}",
            cycle, enable, out["count_out"]
        );
    }
}
