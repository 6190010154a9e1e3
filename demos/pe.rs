//! Example: ALU-style Processing Element
//!
//! Compiles a PE with an add/subtract datapath, zero/negative flags, and a
//! configurable look-up table on three predicate bits, then verifies a
//! decode specification and runs the functional model through a few
//! cycles.
//!
//! Run with: cargo run --example pe

use indexmap::IndexMap;

use pe_dsl::{compile, DecodeSpec, FunctionalModelBackend, ModelOptions, Value};

const SOURCE: &str = "
    enum Op { ADD, SUB }
    enum FlagSel { Z, NOT_Z, N, NOT_N, LUT_CODE }

    lut_code = Input(Configuration(BitVector(8)));
    op_code = Input(Configuration(Encoded(Op, operation, FlagSel, flag_sel)));

    data0 = Input(BitVector(16));
    data1 = Input(BitVector(16));
    bit0 = Input(BitVector(1));
    bit1 = Input(BitVector(1));
    bit2 = Input(BitVector(1));

    res = Output(BitVector(16));
    res_p = Output(BitVector(1));

    z = Intermediate(BitVector(1));
    n = Intermediate(BitVector(1));
    lut_index = Intermediate(BitVector(3));

    if op_code.operation == Op.ADD { res.assign(data0 + data1); }
    elif op_code.operation == Op.SUB { res.assign(data0 - data1); }

    z.assign(res == 16'd0);
    n.assign(res[15]);
    lut_index.assign(concat(bit2, concat(bit1, bit0)));

    if op_code.flag_sel == FlagSel.Z { res_p.assign(z); }
    elif op_code.flag_sel == FlagSel.NOT_Z { res_p.assign(~z); }
    elif op_code.flag_sel == FlagSel.N { res_p.assign(n); }
    elif op_code.flag_sel == FlagSel.NOT_N { res_p.assign(~n); }
    else { res_p.assign((lut_code >> lut_index)[0]); }
";

fn op_code(operation: &str, flag_sel: &str) -> Value {
    let mut record = IndexMap::new();
    record.insert(
        "operation".to_string(),
        Value::enumeration("Op", operation),
    );
    record.insert(
        "flag_sel".to_string(),
        Value::enumeration("FlagSel", flag_sel),
    );
    Value::Record(record)
}

fn config(lut_code: u64, operation: &str, flag_sel: &str) -> IndexMap<String, Value> {
    let mut config = IndexMap::new();
    config.insert("lut_code".to_string(), Value::bits(8, lut_code));
    config.insert("op_code".to_string(), op_code(operation, flag_sel));
    config
}

fn inputs(data0: u64, data1: u64, bits: (u64, u64, u64)) -> IndexMap<String, Value> {
    let mut inputs = IndexMap::new();
    inputs.insert("data0".to_string(), Value::bits(16, data0));
    inputs.insert("data1".to_string(), Value::bits(16, data1));
    inputs.insert("bit0".to_string(), Value::bits(1, bits.0));
    inputs.insert("bit1".to_string(), Value::bits(1, bits.1));
    inputs.insert("bit2".to_string(), Value::bits(1, bits.2));
    inputs
}

fn main() {
    println!("=== ALU Processing Element Example ===\n");

    let (ir, _types) = compile("pe", SOURCE).unwrap();
    println!(
        "Compiled: {} inputs, {} outputs, {} statements",
        ir.inputs.len(),
        ir.outputs.len(),
        ir.body.len()
    );

    // A decode specification: 1 code bit for Op, 3 for FlagSel, both
    // packed into a 4-bit op_code word.
    let spec = DecodeSpec::new()
        .with_enum("Op", 1, [("ADD", 0), ("SUB", 1)])
        .with_enum(
            "FlagSel",
            3,
            [("Z", 0), ("NOT_Z", 1), ("N", 2), ("NOT_N", 3), ("LUT_CODE", 4)],
        )
        .with_encoded("op_code", 4, [("operation", 0, 0), ("flag_sel", 1, 3)]);
    pe_dsl::decode::verify(&spec, &ir).unwrap();
    println!("Decode specification verified\n");

    let backend = FunctionalModelBackend::new(
        &ir,
        ModelOptions {
            validate_inputs: true,
        },
    );

    // Scenario 1: addition, predicate = zero flag
    let mut pe = backend.instantiate(config(0, "ADD", "Z")).unwrap();
    let out = pe.call(inputs(5, 3, (0, 0, 0))).unwrap();
    println!("ADD 5 + 3      -> res = {}, res_p(Z) = {}", out["res"], out["res_p"]);

    // Scenario 2: subtraction wraps, predicate = negative flag (bit 15)
    let mut pe = backend.instantiate(config(0, "SUB", "N")).unwrap();
    let out = pe.call(inputs(3, 5, (0, 0, 0))).unwrap();
    println!("SUB 3 - 5      -> res = {}, res_p(N) = {}", out["res"], out["res_p"]);

    // Scenario 3: predicate from the LUT at index bit2:bit1:bit0 = 001
    let mut pe = backend
        .instantiate(config(0b0000_0110, "ADD", "LUT_CODE"))
        .unwrap();
    let out = pe.call(inputs(1, 1, (1, 0, 0))).unwrap();
    println!("LUT[001]       -> res = {}, res_p = {}", out["res"], out["res_p"]);
}
