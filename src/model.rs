//! Functional-model backend
//!
//! Turns a compiled description into an executable model of the processing
//! element. A `FunctionalModelBackend` partitions the interface once;
//! `instantiate` binds configuration values and yields a stateful
//! `FunctionalModel` that is called with dynamic inputs, one call per
//! clock cycle.
//!
//! Register semantics: reads inside a call observe the value a register
//! held when the call started, writes land in a shadow slot, and shadows
//! are committed when the call completes. Register files commit
//! element-wise, so elements not written during a call keep their values.
//!
//! A call that fails its argument checks is refused before any statement
//! runs, and a call that fails mid-evaluation discards its shadow writes,
//! so persistent state is never left half-updated.

use indexmap::IndexMap;

use crate::error::ModelError;
use crate::ir::{ExprId, ExprKind, Ir, Literal, Op, Statement};
use crate::types::{BaseType, UnqualifiedType};
use crate::value::{Bits, Value};

/// Backend behavior switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelOptions {
    /// Validate dynamic input values against their declared types on every
    /// call. Configuration values are always validated at instantiation.
    pub validate_inputs: bool,
}

/// A compiled description ready to be instantiated
#[derive(Debug, Clone)]
pub struct FunctionalModelBackend {
    ir: Ir,
    /// Configuration-qualified inputs, bound once per instance
    configs: IndexMap<String, UnqualifiedType>,
    /// Remaining inputs, supplied on every call
    dynamics: IndexMap<String, UnqualifiedType>,
    outputs: IndexMap<String, UnqualifiedType>,
    /// Register-qualified intermediates, persistent across calls
    registers: IndexMap<String, UnqualifiedType>,
    /// Per-call intermediates
    locals: IndexMap<String, UnqualifiedType>,
    options: ModelOptions,
}

impl FunctionalModelBackend {
    pub fn new(ir: &Ir, options: ModelOptions) -> Self {
        let mut configs = IndexMap::new();
        let mut dynamics = IndexMap::new();
        for (name, ty) in &ir.inputs {
            let target = if ty.qualifiers().configuration {
                &mut configs
            } else {
                &mut dynamics
            };
            target.insert(name.clone(), ty.unqualified().clone());
        }
        let outputs = ir
            .outputs
            .iter()
            .map(|(name, ty)| (name.clone(), ty.unqualified().clone()))
            .collect();
        let mut registers = IndexMap::new();
        let mut locals = IndexMap::new();
        for (name, ty) in &ir.intermediates {
            let target = if ty.qualifiers().register {
                &mut registers
            } else {
                &mut locals
            };
            target.insert(name.clone(), ty.unqualified().clone());
        }
        Self {
            ir: ir.clone(),
            configs,
            dynamics,
            outputs,
            registers,
            locals,
            options,
        }
    }

    pub fn configs(&self) -> &IndexMap<String, UnqualifiedType> {
        &self.configs
    }

    pub fn dynamics(&self) -> &IndexMap<String, UnqualifiedType> {
        &self.dynamics
    }

    pub fn outputs(&self) -> &IndexMap<String, UnqualifiedType> {
        &self.outputs
    }

    /// Bind configuration values, producing a fresh model with all
    /// registers in their initial (unset) state
    pub fn instantiate(
        &self,
        config: IndexMap<String, Value>,
    ) -> Result<FunctionalModel<'_>, ModelError> {
        for name in config.keys() {
            if !self.configs.contains_key(name) {
                return Err(ModelError::UnknownConfiguration(name.clone()));
            }
        }
        for (name, ty) in &self.configs {
            let value = config
                .get(name)
                .ok_or_else(|| ModelError::MissingConfiguration(name.clone()))?;
            self.validate(name, ty, value)?;
        }
        let registers = self
            .registers
            .iter()
            .map(|(name, ty)| (name.clone(), Register::new(ty.clone())))
            .collect();
        Ok(FunctionalModel {
            backend: self,
            config,
            registers,
        })
    }

    fn validate(&self, name: &str, ty: &UnqualifiedType, value: &Value) -> Result<(), ModelError> {
        let mismatch = || ModelError::ArgumentTypeMismatch {
            name: name.to_string(),
            expected: ty.to_string(),
            got: value.describe(),
        };
        match (ty, value) {
            (UnqualifiedType::Base(BaseType::BitVector(w)), Value::Bits(b)) => {
                if b.width() != *w {
                    return Err(mismatch());
                }
            }
            (UnqualifiedType::Base(BaseType::Enum(id)), Value::Enum { enum_id, member }) => {
                let members = self.ir.enums.get(id);
                let known = members.map_or(false, |m| m.contains(member));
                if enum_id != id || !known {
                    return Err(mismatch());
                }
            }
            (UnqualifiedType::Encoded(fields), Value::Record(given)) => {
                if fields.len() != given.len() {
                    return Err(mismatch());
                }
                for (field, base) in fields {
                    let field_value = given.get(field).ok_or_else(mismatch)?;
                    let field_ty = UnqualifiedType::Base(base.clone());
                    self.validate(name, &field_ty, field_value)?;
                }
            }
            (UnqualifiedType::Array(elem, size), Value::Array(items)) => {
                if items.len() != *size {
                    return Err(mismatch());
                }
                for item in items {
                    self.validate(name, elem, item)?;
                }
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

/// Storage for one value that remembers whether it has been set; register
/// files track this per element
#[derive(Debug, Clone)]
enum Slot {
    Scalar(Option<Value>),
    Array(Vec<Option<Value>>),
}

impl Slot {
    fn for_type(ty: &UnqualifiedType) -> Self {
        match ty {
            UnqualifiedType::Array(_, size) => Slot::Array(vec![None; *size]),
            _ => Slot::Scalar(None),
        }
    }
}

/// One persistent register: current value plus the shadow written this call
#[derive(Debug, Clone)]
struct Register {
    ty: UnqualifiedType,
    curr: Slot,
    next: Slot,
}

impl Register {
    fn new(ty: UnqualifiedType) -> Self {
        Self {
            curr: Slot::for_type(&ty),
            next: Slot::for_type(&ty),
            ty,
        }
    }

    /// Move shadow writes into the visible state; untouched elements keep
    /// their values
    fn commit(&mut self) {
        match (&mut self.curr, &mut self.next) {
            (Slot::Scalar(curr), Slot::Scalar(next)) => {
                if let Some(v) = next.take() {
                    *curr = Some(v);
                }
            }
            (Slot::Array(curr), Slot::Array(next)) => {
                for (c, n) in curr.iter_mut().zip(next.iter_mut()) {
                    if let Some(v) = n.take() {
                        *c = Some(v);
                    }
                }
            }
            _ => unreachable!("register slots share one shape"),
        }
    }

    fn discard(&mut self) {
        match &mut self.next {
            Slot::Scalar(next) => *next = None,
            Slot::Array(next) => next.iter_mut().for_each(|n| *n = None),
        }
    }
}

/// The unset-read default: quantitative state powers up as zero, nominal
/// state has no defensible default and must be written first
fn default_value(ty: &UnqualifiedType) -> Option<Value> {
    match ty {
        UnqualifiedType::Base(BaseType::BitVector(w)) => Some(Value::Bits(Bits::zero(*w))),
        UnqualifiedType::Base(BaseType::Enum(_)) => None,
        UnqualifiedType::Encoded(fields) => {
            let mut record = IndexMap::new();
            for (name, base) in fields {
                let v = default_value(&UnqualifiedType::Base(base.clone()))?;
                record.insert(name.clone(), v);
            }
            Some(Value::Record(record))
        }
        UnqualifiedType::Array(elem, size) => {
            let v = default_value(elem)?;
            Some(Value::Array(vec![v; *size]))
        }
    }
}

/// A configured, stateful instance of a description
#[derive(Debug)]
pub struct FunctionalModel<'a> {
    backend: &'a FunctionalModelBackend,
    config: IndexMap<String, Value>,
    registers: IndexMap<String, Register>,
}

impl<'a> FunctionalModel<'a> {
    /// Run one call: bind dynamic inputs, execute the body, commit
    /// registers, and collect the outputs
    pub fn call(
        &mut self,
        inputs: IndexMap<String, Value>,
    ) -> Result<IndexMap<String, Value>, ModelError> {
        let backend = self.backend;
        for name in inputs.keys() {
            if !backend.dynamics.contains_key(name) {
                return Err(ModelError::UnknownInput(name.clone()));
            }
        }
        for (name, ty) in &backend.dynamics {
            let value = inputs
                .get(name)
                .ok_or_else(|| ModelError::MissingInput(name.clone()))?;
            if backend.options.validate_inputs {
                backend.validate(name, ty, value)?;
            }
        }

        let mut locals: IndexMap<String, Slot> = backend
            .outputs
            .iter()
            .chain(&backend.locals)
            .map(|(name, ty)| (name.clone(), Slot::for_type(ty)))
            .collect();

        let outputs = self
            .exec_block(&backend.ir.body, &inputs, &mut locals)
            .and_then(|()| collect_outputs(backend, &locals));
        // Shadow writes become visible only when the whole call succeeds.
        match outputs {
            Ok(outputs) => {
                for reg in self.registers.values_mut() {
                    reg.commit();
                }
                Ok(outputs)
            }
            Err(e) => {
                for reg in self.registers.values_mut() {
                    reg.discard();
                }
                Err(e)
            }
        }
    }

    fn exec_block(
        &mut self,
        stmts: &[Statement],
        inputs: &IndexMap<String, Value>,
        locals: &mut IndexMap<String, Slot>,
    ) -> Result<(), ModelError> {
        for stmt in stmts {
            self.exec_stmt(stmt, inputs, locals)?;
        }
        Ok(())
    }

    fn exec_stmt(
        &mut self,
        stmt: &Statement,
        inputs: &IndexMap<String, Value>,
        locals: &mut IndexMap<String, Slot>,
    ) -> Result<(), ModelError> {
        match stmt {
            Statement::Assign { lhs, rhs, .. } => {
                let value = self.eval(*rhs, inputs, locals)?;
                self.store(*lhs, value, inputs, locals)
            }
            Statement::Switch {
                subject,
                arms,
                default,
                ..
            } => {
                let subject = self.eval(*subject, inputs, locals)?;
                for arm in arms {
                    let label = self.eval(arm.label, inputs, locals)?;
                    if subject == label {
                        return self.exec_block(&arm.body, inputs, locals);
                    }
                }
                match default {
                    Some(body) => self.exec_block(body, inputs, locals),
                    None => Ok(()),
                }
            }
            Statement::Nop { .. } => Ok(()),
        }
    }

    fn store(
        &mut self,
        lhs: ExprId,
        value: Value,
        inputs: &IndexMap<String, Value>,
        locals: &mut IndexMap<String, Slot>,
    ) -> Result<(), ModelError> {
        let ir = &self.backend.ir;
        match &ir.expr(lhs).kind {
            ExprKind::Name(name) => {
                let name = name.clone();
                self.store_scalar(&name, value, locals)
            }
            ExprKind::Op { op: Op::Slice, args } => {
                let name = match &ir.expr(args[0]).kind {
                    ExprKind::Name(name) => name.clone(),
                    _ => return Err(ModelError::Evaluation("invalid assignment target".into())),
                };
                let index = self.eval_index(args[1], inputs, locals)?;
                self.store_element(&name, index, value, locals)
            }
            _ => Err(ModelError::Evaluation("invalid assignment target".into())),
        }
    }

    fn store_scalar(
        &mut self,
        name: &str,
        value: Value,
        locals: &mut IndexMap<String, Slot>,
    ) -> Result<(), ModelError> {
        if let Some(reg) = self.registers.get_mut(name) {
            reg.next = Slot::Scalar(Some(value));
            return Ok(());
        }
        match locals.get_mut(name) {
            Some(slot) => {
                *slot = Slot::Scalar(Some(value));
                Ok(())
            }
            None => Err(ModelError::Evaluation(format!(
                "'{}' is not assignable",
                name
            ))),
        }
    }

    /// Element write: register-file or array element, or a single bit of a
    /// bit-vector target
    fn store_element(
        &mut self,
        name: &str,
        index: u64,
        value: Value,
        locals: &mut IndexMap<String, Slot>,
    ) -> Result<(), ModelError> {
        if let Some(reg) = self.registers.get_mut(name) {
            match &mut reg.next {
                Slot::Array(items) => {
                    let slot = items.get_mut(index as usize).ok_or_else(|| {
                        ModelError::Evaluation(format!("index {} out of range for '{}'", index, name))
                    })?;
                    *slot = Some(value);
                    Ok(())
                }
                Slot::Scalar(next) => {
                    // Bit write: start from the shadow if already written
                    // this call, otherwise from the visible value.
                    let base = match next.clone().or_else(|| match &reg.curr {
                        Slot::Scalar(curr) => curr.clone(),
                        Slot::Array(_) => None,
                    }) {
                        Some(v) => v,
                        None => default_value(&reg.ty)
                            .ok_or_else(|| ModelError::RegisterUnset(name.to_string()))?,
                    };
                    let updated = write_bit(name, base, index, value)?;
                    *next = Some(updated);
                    Ok(())
                }
            }
        } else {
            match locals.get_mut(name) {
                Some(Slot::Array(items)) => {
                    let slot = items.get_mut(index as usize).ok_or_else(|| {
                        ModelError::Evaluation(format!("index {} out of range for '{}'", index, name))
                    })?;
                    *slot = Some(value);
                    Ok(())
                }
                Some(Slot::Scalar(slot)) => {
                    let ty = self
                        .backend
                        .outputs
                        .get(name)
                        .or_else(|| self.backend.locals.get(name));
                    let base = match slot.clone() {
                        Some(v) => v,
                        None => ty
                            .and_then(default_value)
                            .ok_or_else(|| ModelError::NameUnset(name.to_string()))?,
                    };
                    let updated = write_bit(name, base, index, value)?;
                    *slot = Some(updated);
                    Ok(())
                }
                None => Err(ModelError::Evaluation(format!(
                    "'{}' is not assignable",
                    name
                ))),
            }
        }
    }

    fn eval(
        &self,
        id: ExprId,
        inputs: &IndexMap<String, Value>,
        locals: &IndexMap<String, Slot>,
    ) -> Result<Value, ModelError> {
        let ir = &self.backend.ir;
        let node = ir.expr(id);
        match &node.kind {
            ExprKind::Name(name) => self.read_name(name, inputs, locals),
            ExprKind::Literal(Literal::Bits(b)) => Ok(Value::Bits(*b)),
            ExprKind::Literal(Literal::Enum { enum_id, member }) => {
                Ok(Value::enumeration(enum_id.clone(), member.clone()))
            }
            ExprKind::Literal(Literal::Int(n)) => Err(ModelError::Evaluation(format!(
                "integer literal {} has no runtime value",
                n
            ))),
            ExprKind::Field { base, field } => {
                let base = self.eval(*base, inputs, locals)?;
                match base {
                    Value::Record(fields) => fields.get(field).cloned().ok_or_else(|| {
                        ModelError::Evaluation(format!("record has no field '{}'", field))
                    }),
                    other => Err(ModelError::Evaluation(format!(
                        "field access on {}",
                        other.describe()
                    ))),
                }
            }
            ExprKind::Op { op, args } => self.eval_op(*op, args, inputs, locals),
        }
    }

    fn eval_op(
        &self,
        op: Op,
        args: &[ExprId],
        inputs: &IndexMap<String, Value>,
        locals: &IndexMap<String, Slot>,
    ) -> Result<Value, ModelError> {
        match op {
            Op::Add | Op::Sub | Op::And | Op::Or => {
                let left = self.eval_bits(args[0], inputs, locals)?;
                let right = self.eval_bits(args[1], inputs, locals)?;
                let result = match op {
                    Op::Add => left.add(right),
                    Op::Sub => left.sub(right),
                    Op::And => left.and(right),
                    Op::Or => left.or(right),
                    _ => unreachable!(),
                };
                Ok(Value::Bits(result))
            }
            Op::Shl | Op::Shr => {
                let left = self.eval_bits(args[0], inputs, locals)?;
                let amount = self.eval_index(args[1], inputs, locals)?;
                let result = match op {
                    Op::Shl => left.shl(amount),
                    _ => left.shr(amount),
                };
                Ok(Value::Bits(result))
            }
            Op::Not => {
                let operand = self.eval_bits(args[0], inputs, locals)?;
                Ok(Value::Bits(operand.not()))
            }
            Op::Eq | Op::Ne => {
                let left = self.eval(args[0], inputs, locals)?;
                let right = self.eval(args[1], inputs, locals)?;
                let equal = left == right;
                Ok(Value::Bits(Bits::from_bool(if op == Op::Eq {
                    equal
                } else {
                    !equal
                })))
            }
            Op::Concat => {
                let high = self.eval_bits(args[0], inputs, locals)?;
                let low = self.eval_bits(args[1], inputs, locals)?;
                Ok(Value::Bits(high.concat(low)))
            }
            Op::Slice => {
                let base = self.eval(args[0], inputs, locals)?;
                let index = self.eval_index(args[1], inputs, locals)?;
                match base {
                    Value::Bits(b) => Ok(Value::Bits(b.bit(index as u32))),
                    Value::Array(items) => items.get(index as usize).cloned().ok_or_else(|| {
                        ModelError::Evaluation(format!("index {} out of range", index))
                    }),
                    other => Err(ModelError::Evaluation(format!(
                        "cannot slice {}",
                        other.describe()
                    ))),
                }
            }
            // Only the taken branch is evaluated.
            Op::Ternary => {
                let cond = self.eval_bits(args[0], inputs, locals)?;
                let taken = if cond.is_nonzero() { args[1] } else { args[2] };
                self.eval(taken, inputs, locals)
            }
        }
    }

    fn eval_bits(
        &self,
        id: ExprId,
        inputs: &IndexMap<String, Value>,
        locals: &IndexMap<String, Slot>,
    ) -> Result<Bits, ModelError> {
        let value = self.eval(id, inputs, locals)?;
        value.as_bits().ok_or_else(|| {
            ModelError::Evaluation(format!("expected a bit vector, got {}", value.describe()))
        })
    }

    /// A slice index or shift amount: a static integer or any bit vector
    fn eval_index(
        &self,
        id: ExprId,
        inputs: &IndexMap<String, Value>,
        locals: &IndexMap<String, Slot>,
    ) -> Result<u64, ModelError> {
        if let ExprKind::Literal(Literal::Int(n)) = &self.backend.ir.expr(id).kind {
            return Ok(*n);
        }
        Ok(self.eval_bits(id, inputs, locals)?.value())
    }

    fn read_name(
        &self,
        name: &str,
        inputs: &IndexMap<String, Value>,
        locals: &IndexMap<String, Slot>,
    ) -> Result<Value, ModelError> {
        if let Some(v) = inputs.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.config.get(name) {
            return Ok(v.clone());
        }
        if let Some(reg) = self.registers.get(name) {
            return read_register(name, reg);
        }
        match locals.get(name) {
            Some(Slot::Scalar(Some(v))) => Ok(v.clone()),
            Some(Slot::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Some(v) => out.push(v.clone()),
                        None => return Err(ModelError::NameUnset(name.to_string())),
                    }
                }
                Ok(Value::Array(out))
            }
            Some(Slot::Scalar(None)) => Err(ModelError::NameUnset(name.to_string())),
            None => Err(ModelError::Evaluation(format!("unknown name '{}'", name))),
        }
    }
}

fn collect_outputs(
    backend: &FunctionalModelBackend,
    locals: &IndexMap<String, Slot>,
) -> Result<IndexMap<String, Value>, ModelError> {
    let mut outputs = IndexMap::new();
    for name in backend.outputs.keys() {
        let value = match &locals[name] {
            Slot::Scalar(Some(v)) => v.clone(),
            Slot::Array(items) if items.iter().all(Option::is_some) => {
                Value::Array(items.iter().cloned().flatten().collect())
            }
            _ => return Err(ModelError::OutputNotAssigned(name.clone())),
        };
        outputs.insert(name.clone(), value);
    }
    Ok(outputs)
}

fn read_register(name: &str, reg: &Register) -> Result<Value, ModelError> {
    let unset = || match &reg.ty {
        UnqualifiedType::Array(elem, _) => default_value(elem),
        ty => default_value(ty),
    };
    match &reg.curr {
        Slot::Scalar(Some(v)) => Ok(v.clone()),
        Slot::Scalar(None) => {
            default_value(&reg.ty).ok_or_else(|| ModelError::RegisterUnset(name.to_string()))
        }
        Slot::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Some(v) => out.push(v.clone()),
                    None => out
                        .push(unset().ok_or_else(|| ModelError::RegisterUnset(name.to_string()))?),
                }
            }
            Ok(Value::Array(out))
        }
    }
}

/// Replace one bit of a bit-vector value
fn write_bit(name: &str, base: Value, index: u64, value: Value) -> Result<Value, ModelError> {
    let base = base.as_bits().ok_or_else(|| {
        ModelError::Evaluation(format!("cannot write a bit of '{}'", name))
    })?;
    let bit = value.as_bits().ok_or_else(|| {
        ModelError::Evaluation(format!("bit written to '{}' must be a bit vector", name))
    })?;
    Ok(Value::Bits(base.with_bit(index as u32, bit)))
}
