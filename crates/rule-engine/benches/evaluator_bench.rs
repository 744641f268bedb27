//! 条件评估器性能基准测试
//!
//! 覆盖单个操作符、嵌套条件树与完整规则评估。

use std::hint::black_box;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::action::InMemoryPlatform;
use rule_engine::{
    ActionDispatcher, ActionType, ConditionEvaluator, EntityData, FieldType, FieldValue, Operator,
    Rule, RuleAction, RuleCondition, RuleEngine,
};

fn create_entity() -> EntityData {
    EntityData::new()
        .with("id", uuid::Uuid::new_v4())
        .with("name", "Contoso Ltd")
        .with("revenue", 1_500_000.0)
        .with("employees", 250)
        .with("email", "contact@contoso.com")
        .with("tags", vec!["enterprise", "priority", "emea"])
        .with(
            "lastContact",
            Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        )
}

/// 单个叶子条件基准
fn bench_leaf_operators(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_operators");
    let entity = create_entity();
    let evaluator = ConditionEvaluator::at(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());

    let cases = [
        (
            "equals",
            RuleCondition::leaf("name", Operator::Equals, FieldType::String, "Contoso Ltd"),
        ),
        (
            "greater_than",
            RuleCondition::leaf("revenue", Operator::GreaterThan, FieldType::Money, "1000000"),
        ),
        (
            "contains_ignore_case",
            match RuleCondition::leaf("name", Operator::Contains, FieldType::String, "contoso") {
                RuleCondition::Leaf(leaf) => RuleCondition::Leaf(leaf.ignoring_case()),
                other => other,
            },
        ),
        (
            "regex_match",
            RuleCondition::leaf(
                "email",
                Operator::RegexMatch,
                FieldType::String,
                r"^[a-z]+@[a-z]+\.com$",
            ),
        ),
        (
            "in",
            RuleCondition::leaf(
                "employees",
                Operator::In,
                FieldType::Int,
                FieldValue::from(vec![100, 250, 500]),
            ),
        ),
        (
            "contains_any",
            RuleCondition::leaf(
                "tags",
                Operator::ContainsAny,
                FieldType::String,
                FieldValue::from(vec!["apac", "emea"]),
            ),
        ),
        (
            "is_within_days",
            RuleCondition::leaf("lastContact", Operator::IsWithinDays, FieldType::DateTime, 7),
        ),
    ];

    for (name, condition) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), condition, |b, cond| {
            b.iter(|| evaluator.evaluate(black_box(Some(cond)), black_box(&entity)))
        });
    }

    group.finish();
}

/// 构造指定深度的 AND/OR 交替条件树
fn nested_condition(depth: usize) -> RuleCondition {
    let leaf = RuleCondition::leaf("employees", Operator::GreaterThanOrEquals, FieldType::Int, "100");
    (0..depth).fold(leaf, |inner, level| {
        let sibling = RuleCondition::leaf("name", Operator::StartsWith, FieldType::String, "Con");
        if level % 2 == 0 {
            RuleCondition::and(vec![sibling, inner])
        } else {
            RuleCondition::or(vec![inner, sibling])
        }
    })
}

/// 嵌套深度基准
fn bench_nested_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_conditions");
    let entity = create_entity();
    let evaluator = ConditionEvaluator::new();

    for depth in [1, 4, 16] {
        let condition = nested_condition(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &condition, |b, cond| {
            b.iter(|| evaluator.evaluate(black_box(Some(cond)), black_box(&entity)))
        });
    }

    group.finish();
}

/// 完整规则评估（含动作执行）基准
fn bench_rule_evaluation(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let platform = Arc::new(InMemoryPlatform::new());
    let engine = RuleEngine::new(Arc::new(ActionDispatcher::with_defaults(platform)));
    let entity = create_entity();

    let rule = Rule::new("Enterprise follow-up", "account")
        .with_condition(nested_condition(4))
        .with_action(
            RuleAction::new(ActionType::CreateRecord, "task")
                .with_parameter("subject", "Follow up")
                .with_parameter("priority", 1),
        );

    c.bench_function("rule_evaluation", |b| {
        b.iter(|| runtime.block_on(engine.evaluate_rule(black_box(&rule), black_box(&entity))))
    });
}

criterion_group!(
    benches,
    bench_leaf_operators,
    bench_nested_conditions,
    bench_rule_evaluation
);
criterion_main!(benches);
