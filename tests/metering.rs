//! Instruction counting and cost metering through attached statistics

mod common;

use std::sync::Arc;

use common::{init_tracing, loop_module};
use wasmbed::ast::{FunctionType, Instruction, ModuleBuilder};
use wasmbed::runtime::{
    Configure, ErrCode, Executor, Function, ModuleInstance, ResultCode, RuntimeError, Statistics, StatisticsConfig,
    Store, Trap, Value,
};

/// `count(10)`: ten passes over the seven-instruction loop body, plus the
/// `loop` itself and the trailing constant
const COUNT_10_INSTRUCTIONS: u64 = 72;

fn metered(stats: &Arc<Statistics>) -> Executor {
    Executor::new(None, Some(Arc::clone(stats)))
}

#[test]
fn counts_every_executed_instruction() {
    init_tracing();
    let stats = Arc::new(Statistics::new());
    let executor = metered(&stats);
    let store = Store::new();
    let guest = executor.register(&store, &loop_module(), "guest").unwrap();

    let (_, results) = executor.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
    assert_eq!(stats.instr_count(), COUNT_10_INSTRUCTIONS);
    assert_eq!(stats.total_cost(), COUNT_10_INSTRUCTIONS);
    assert!(stats.total_exec_time() >= stats.wasm_exec_time());

    stats.clear();
    assert_eq!(stats.instr_count(), 0);
    assert_eq!(stats.total_cost(), 0);
    stats.dump();
}

#[test]
fn cost_limit_stops_execution() {
    let stats = Arc::new(Statistics::new());
    stats.set_cost_limit(50);
    let executor = metered(&stats);
    let store = Store::new();
    let guest = executor.register(&store, &loop_module(), "guest").unwrap();

    let err = executor.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap_err();
    assert_eq!(err, RuntimeError::Trap(Trap::CostLimitExceeded));
    assert_eq!(ResultCode::from(&err), ResultCode::wasm(ErrCode::CostLimitExceeded));
    assert_eq!(stats.total_cost(), 50);
    assert_eq!(stats.cost_limit(), 50);
}

#[test]
fn cost_table_weights_opcodes() {
    let stats = Arc::new(Statistics::new());
    // i32.add (0x6a) costs 10, everything else keeps the default of 1
    let mut costs = vec![1; 0x6b];
    costs[0x6a] = 10;
    stats.set_cost_table(&costs);
    let executor = metered(&stats);
    let store = Store::new();
    let guest = executor.register(&store, &loop_module(), "guest").unwrap();

    executor.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap();
    assert_eq!(stats.instr_count(), COUNT_10_INSTRUCTIONS);
    assert_eq!(stats.total_cost(), COUNT_10_INSTRUCTIONS + 10 * 9);
}

#[test]
fn host_functions_charge_their_declared_cost() {
    let stats = Arc::new(Statistics::new());
    let executor = metered(&stats);
    let store = Store::new();
    let mut env = ModuleInstance::new("env");
    env.add_function(
        "tick",
        Function::new_host(FunctionType::new(vec![], vec![]), |_, _, _| Ok(()), 100),
    );
    executor.register_import(&store, &env).unwrap();

    let mut builder = ModuleBuilder::new();
    let tick = builder.import_function("env", "tick", FunctionType::new(vec![], vec![]));
    let run = builder.function(
        FunctionType::new(vec![], vec![]),
        vec![],
        vec![Instruction::Call(tick), Instruction::Call(tick)],
    );
    builder.export_function("run", run);
    let guest = executor.register(&store, &builder.build().unwrap(), "guest").unwrap();

    executor.invoke_export(&guest, "run", &[]).unwrap();
    // two calls plus two host charges
    assert_eq!(stats.instr_count(), 2);
    assert_eq!(stats.total_cost(), 2 + 200);

    stats.set_cost_limit(stats.total_cost() + 150);
    assert_eq!(
        executor.invoke_export(&guest, "run", &[]).unwrap_err(),
        RuntimeError::Trap(Trap::CostLimitExceeded)
    );
}

#[test]
fn disabled_counters_stay_at_zero() {
    let stats = Arc::new(Statistics::new());
    let config = Configure::new().with_statistics(StatisticsConfig {
        instruction_counting: false,
        cost_measuring: false,
        time_measuring: false,
    });
    let executor = Executor::new(Some(config), Some(Arc::clone(&stats)));
    let store = Store::new();
    let guest = executor.register(&store, &loop_module(), "guest").unwrap();

    executor.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap();
    assert_eq!(stats.instr_count(), 0);
    assert_eq!(stats.total_cost(), 0);
    assert_eq!(stats.instr_per_second(), 0.0);
}

#[test]
fn statistics_can_be_shared_between_executors() {
    let stats = Arc::new(Statistics::new());
    let first = metered(&stats);
    let second = metered(&stats);
    let store = Store::new();
    let guest = first.register(&store, &loop_module(), "guest").unwrap();

    first.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap();
    second.invoke_export(&guest, "count", &[Value::I32(10)]).unwrap();
    assert_eq!(stats.instr_count(), 2 * COUNT_10_INSTRUCTIONS);
    assert!(Arc::ptr_eq(first.statistics().unwrap(), second.statistics().unwrap()));
}
