//! Filter compilation and evaluation benchmarks

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use taskdatalib::{Configuration, DateParser, EvalContext, Filter, Task};

fn sample_tasks(count: usize) -> Vec<Task> {
    let entry = Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let mut task = Task::new(&format!("task number {i} for the benchmark"), entry);
            task.set_id(i as u32 + 1);
            if i % 2 == 0 {
                task.set("project", "Home");
            }
            if i % 3 == 0 {
                task.add_tag("urgent").expect("tag");
            }
            if i % 5 == 0 {
                task.set_date("due", entry + chrono::Duration::days(i as i64 % 30));
            }
            task
        })
        .collect()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn benchmark_compilation(c: &mut Criterion) {
    c.bench_function("compile_simple_filter", |b| {
        b.iter(|| Filter::parse(black_box(&args(&["project:Home", "+urgent"]))))
    });

    c.bench_function("compile_expression_filter", |b| {
        b.iter(|| Filter::parse(black_box(&args(&["(due<eom or priority=H)"]))))
    });
}

fn benchmark_evaluation(c: &mut Criterion) {
    let tasks = sample_tasks(1_000);
    let parser = DateParser::new();
    let config = Configuration::default();
    let ctx = EvalContext {
        now: Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap(),
        parser: &parser,
        config: &config,
    };

    let attribute = Filter::parse(&args(&["project:Home", "+urgent"])).expect("filter");
    c.bench_function("eval_attribute_filter_1k", |b| {
        b.iter(|| {
            tasks
                .iter()
                .filter(|t| attribute.matches(t, &ctx).unwrap_or(false))
                .count()
        })
    });

    let expression = Filter::parse(&args(&["(due<eom or priority=H)"])).expect("filter");
    c.bench_function("eval_expression_filter_1k", |b| {
        b.iter(|| {
            tasks
                .iter()
                .filter(|t| expression.matches(t, &ctx).unwrap_or(false))
                .count()
        })
    });

    let sequence = Filter::parse(&args(&["1,100-200,999"])).expect("filter");
    c.bench_function("eval_sequence_filter_1k", |b| {
        b.iter(|| {
            tasks
                .iter()
                .filter(|t| sequence.matches(t, &ctx).unwrap_or(false))
                .count()
        })
    });
}

criterion_group!(benches, benchmark_compilation, benchmark_evaluation);
criterion_main!(benches);
