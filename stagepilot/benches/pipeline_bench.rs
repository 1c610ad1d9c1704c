//! Benchmarks for pipeline transitions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stagepilot::catalogs::{onboarding_registry, OnboardingStage};
use stagepilot::core::CompletionEvidence;
use stagepilot::pipeline::{current_stage, reduce, PipelineCommand, PipelineInstance};
use std::sync::Arc;

fn transition_benchmark(c: &mut Criterion) {
    let registry = match onboarding_registry() {
        Ok(registry) => Arc::new(registry),
        Err(err) => panic!("onboarding registry is invalid: {err}"),
    };

    c.bench_function("complete_then_reject", |b| {
        b.iter(|| {
            let mut instance = PipelineInstance::new(Arc::clone(&registry), "bench");
            let _ = instance.complete_stage(OnboardingStage::Proposal, CompletionEvidence::UserConfirmed);
            let _ = instance.resolve_branch(OnboardingStage::FitReview, "not_fit", serde_json::Value::Null);
            let _ = instance.restart_decision(OnboardingStage::FitReview);
            black_box(instance.snapshot())
        });
    });

    let base = PipelineInstance::new(Arc::clone(&registry), "bench");
    c.bench_function("reduce_complete", |b| {
        b.iter(|| {
            black_box(reduce(
                &base,
                PipelineCommand::Complete(OnboardingStage::Proposal, CompletionEvidence::UserConfirmed),
            ))
        });
    });

    let statuses = base.snapshot().status_map;
    c.bench_function("current_stage", |b| {
        b.iter(|| black_box(current_stage(&registry, black_box(&statuses))));
    });
}

criterion_group!(benches, transition_benchmark);
criterion_main!(benches);
