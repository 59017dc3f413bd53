use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use gridcalc_common::{CellAddress, LiteralValue};
use gridcalc_eval::{Engine, EvalConfig, FormulaInterpreter};
use gridcalc_parse::parse;

/// Column A: a value in A1, then `A{n} = A{n-1}+1` down to row `len`.
fn chain(len: u32) -> (Engine<FormulaInterpreter>, CellAddress) {
    let mut engine = Engine::new(FormulaInterpreter, EvalConfig::default());
    let sid = engine.add_sheet("Sheet1").unwrap();
    let head = CellAddress::new(sid, 0, 0);
    engine.set_cell_value(head, LiteralValue::Number(1.0)).unwrap();
    for row in 1..len {
        let ast = parse(&format!("=A{}+1", row)).unwrap();
        engine.set_cell_formula(CellAddress::new(sid, row, 0), ast).unwrap();
    }
    engine.recalculate().unwrap();
    (engine, head)
}

/// `count` formulas in column B, each summing a growing prefix of column A.
fn prefix_sums(count: u32) -> Engine<FormulaInterpreter> {
    let mut engine = Engine::new(FormulaInterpreter, EvalConfig::default());
    let sid = engine.add_sheet("Sheet1").unwrap();
    for row in 0..count {
        engine
            .set_cell_value(CellAddress::new(sid, row, 0), LiteralValue::Number(row as f64))
            .unwrap();
        let ast = parse(&format!("=SUM(A1:A{})", row + 1)).unwrap();
        engine.set_cell_formula(CellAddress::new(sid, row, 1), ast).unwrap();
    }
    engine
}

fn bench_recalc(c: &mut Criterion) {
    gridcalc_eval::telemetry::init_tracing();
    let mut group = c.benchmark_group("Recalc");
    let sizes = [1_000u32, 10_000];

    for n in sizes.iter() {
        // Edit the head of the chain: every formula is in the dirty closure.
        group.bench_with_input(BenchmarkId::new("Chain/EditHead", n), n, |b, &n| {
            b.iter_batched(
                || chain(n),
                |(mut engine, head)| {
                    engine.set_cell_value(head, black_box(LiteralValue::Number(2.0))).unwrap();
                    engine.recalculate().unwrap()
                },
                BatchSize::LargeInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("Chain/InsertRows", n), n, |b, &n| {
            b.iter_batched(
                || chain(n),
                |(mut engine, _)| engine.insert_rows("Sheet1", black_box(n / 2), 1).unwrap(),
                BatchSize::LargeInput,
            )
        });
    }

    // Overlapping prefixes exercise cache hits and decomposition.
    for n in [500u32, 2_000].iter() {
        group.bench_with_input(BenchmarkId::new("PrefixSums/Cold", n), n, |b, &n| {
            b.iter_batched(
                || prefix_sums(n),
                |mut engine| engine.recalculate().unwrap(),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_recalc);
criterion_main!(benches);
