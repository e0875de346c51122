//! Integration tests for content model compilation and validation
//!
//! Each test builds a model through the public builder or group API and
//! drives the resulting validator the way a document walker would.

use std::sync::Arc;

use rust_decimal::Decimal;
use xmlschema_content::namespaces::QName;
use xmlschema_content::validators::{
    ContentModelBuilder, ContentType, ContentValidator, MatchError, ModelType, NamespaceConstraint,
    Occurs, ParticleArena, ParticleId, RangeStrategy, ValidationState, ValidatorKind, XsdGroup,
};
use xmlschema_content::{Error, Limits, ModelDump};

/// Feed `names` in order. Returns the matched particles if every name was
/// accepted and the content is complete.
fn validate(validator: &Arc<dyn ContentValidator>, names: &[QName]) -> Option<Vec<Option<ParticleId>>> {
    let mut state = ValidationState::new();
    validator.init_validation(&mut state);
    let mut matched = Vec::with_capacity(names.len());
    for name in names {
        matched.push(validator.validate_element(name, &mut state).ok()?);
    }
    validator.complete_validation(&state).then_some(matched)
}

fn repeated(name: &str, count: usize) -> Vec<QName> {
    vec![QName::local(name); count]
}

fn accepted_counts(validator: &Arc<dyn ContentValidator>, upto: usize) -> Vec<usize> {
    (0..=upto)
        .filter(|&n| validate(validator, &repeated("a", n)).is_some())
        .collect()
}

fn range_of_a(min: u32, max: Option<u32>) -> Arc<dyn ContentValidator> {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::new(min, max));
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
    builder.open_group();
    builder.add_name(QName::local("a"), a);
    builder.close_group().unwrap();
    let (min, max) = Occurs::new(min, max).to_decimal_range();
    builder.add_bounded_range(min, max).unwrap();
    builder.finish().unwrap()
}

#[test]
fn test_range_two_to_four() {
    let validator = range_of_a(2, Some(4));
    assert_eq!(validator.kind(), ValidatorKind::Range);
    assert_eq!(accepted_counts(&validator, 7), vec![2, 3, 4]);
}

#[test]
fn test_range_zero_to_two() {
    let validator = range_of_a(0, Some(2));
    assert!(validator.is_emptiable());
    assert_eq!(accepted_counts(&validator, 7), vec![0, 1, 2]);
}

#[test]
fn test_nested_ranges() {
    // ((a){1,2}){2,3}
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::new(1, Some(2)));
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
    builder.open_group();
    builder.open_group();
    builder.add_name(QName::local("a"), a);
    builder.close_group().unwrap();
    builder
        .add_bounded_range(Decimal::ONE, Decimal::from(2))
        .unwrap();
    builder.close_group().unwrap();
    builder
        .add_bounded_range(Decimal::from(2), Decimal::from(3))
        .unwrap();
    let validator = builder.finish().unwrap();

    assert_eq!(validator.dump().ranges.len(), 2);
    // two or three iterations of one or two a's
    assert_eq!(accepted_counts(&validator, 8), vec![2, 3, 4, 5, 6]);
}

#[test]
fn test_range_inside_sequence() {
    // a{2,3}, b
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::new(2, Some(3)));
    let b = arena.element(QName::local("b"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Sequence);
    group.add_element(a);
    group.add_element(b);
    let validator = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();

    let input = [QName::local("a"), QName::local("a"), QName::local("b")];
    assert_eq!(validate(&validator, &input), Some(vec![Some(a), Some(a), Some(b)]));
    assert!(validate(&validator, &[QName::local("a"), QName::local("b")]).is_none());
    assert!(validate(&validator, &repeated("a", 3)).is_none());
}

#[test]
fn test_upa_violation_names_both_particles() {
    // two substitution group members resolving to the same tag
    let mut arena = ParticleArena::new();
    let head = arena.element(QName::namespaced("urn:x", "item"), Occurs::once());
    let member = arena.element(QName::namespaced("urn:x", "item"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Choice);
    group.add_element(head);
    group.add_element(member);

    let err = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap_err();
    match err {
        Error::Upa(upa) => {
            assert_eq!(upa.particles(), (head, member));
            assert_eq!(upa.label1, "{urn:x}item");
            assert!(upa.to_string().contains("{urn:x}item"));
        }
        other => panic!("expected a UPA error, got {}", other),
    }
}

#[test]
fn test_upa_violation_in_range_model() {
    let mut arena = ParticleArena::new();
    let first = arena.element(QName::local("a"), Occurs::once());
    let second = arena.element(QName::local("a"), Occurs::once());
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
    builder.open_group();
    builder.add_name(QName::local("a"), first);
    builder.close_group().unwrap();
    builder
        .add_bounded_range(Decimal::ONE, Decimal::from(3))
        .unwrap();
    builder.add_sequence().unwrap();
    builder.add_name(QName::local("a"), second);
    assert!(matches!(builder.finish(), Err(Error::Upa(_))));
}

#[test]
fn test_shared_particle_compiles() {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Sequence);
    group.add_element(a);
    group.add_element(a);
    let validator = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();
    assert_eq!(validator.kind(), ValidatorKind::Dfa);
    assert!(validate(&validator, &repeated("a", 2)).is_some());
}

fn element_or_any() -> (ContentModelBuilder, ParticleId, ParticleId) {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::once());
    let any = arena.any(NamespaceConstraint::Any, Occurs::once());
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly).upa_check(false);
    builder.open_group();
    builder.add_name(QName::local("a"), a);
    builder.add_choice().unwrap();
    builder.add_namespace_wildcard(&NamespaceConstraint::Any, any);
    builder.close_group().unwrap();
    (builder, a, any)
}

#[test]
fn test_element_outranks_wildcard() {
    // (a | ##any)*
    let (mut builder, a, any) = element_or_any();
    builder.add_star().unwrap();
    let validator = builder.finish().unwrap();
    assert_eq!(validator.kind(), ValidatorKind::Nfa);

    let input = [
        QName::local("a"),
        QName::namespaced("urn:other", "b"),
        QName::local("a"),
    ];
    assert_eq!(validate(&validator, &input), Some(vec![Some(a), Some(any), Some(a)]));
}

#[test]
fn test_element_outranks_wildcard_in_range() {
    // (a | ##any){1,3}
    let (mut builder, a, any) = element_or_any();
    builder
        .add_bounded_range(Decimal::ONE, Decimal::from(3))
        .unwrap();
    let validator = builder.finish().unwrap();
    assert_eq!(validator.kind(), ValidatorKind::Range);

    let input = [QName::local("x"), QName::local("a")];
    assert_eq!(validate(&validator, &input), Some(vec![Some(any), Some(a)]));
    assert!(validate(&validator, &repeated("a", 4)).is_none());
}

#[test]
fn test_wildcard_ambiguity_is_rejected() {
    let (mut builder, _, _) = element_or_any();
    builder.add_star().unwrap();
    let builder = builder.upa_check(true);
    assert!(matches!(builder.finish(), Err(Error::Upa(_))));
}

#[test]
fn test_namespace_list_wildcard() {
    let mut arena = ParticleArena::new();
    let constraint = NamespaceConstraint::from_namespace_attr("urn:a ##local", None).unwrap();
    let any = arena.any(constraint.clone(), Occurs::one_or_more());
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
    builder.add_namespace_wildcard(&constraint, any);
    builder.add_plus().unwrap();
    let validator = builder.finish().unwrap();
    assert_eq!(validator.kind(), ValidatorKind::Dfa);

    let input = [QName::namespaced("urn:a", "x"), QName::local("y")];
    assert_eq!(validate(&validator, &input), Some(vec![Some(any), Some(any)]));
    assert!(validate(&validator, &[QName::namespaced("urn:b", "x")]).is_none());
}

#[test]
fn test_trivial_models() {
    let empty = ContentModelBuilder::new(ContentType::Empty).finish().unwrap();
    let mut state = ValidationState::new();
    empty.init_validation(&mut state);
    assert_eq!(
        empty.validate_element(&QName::local("a"), &mut state),
        Err(MatchError::Unexpected)
    );
    assert!(empty.complete_validation(&state));

    let text = ContentModelBuilder::new(ContentType::TextOnly).finish().unwrap();
    assert_eq!(text.content_type(), ContentType::TextOnly);
    assert_eq!(text.kind(), ValidatorKind::Trivial);

    let any = ContentModelBuilder::new(ContentType::Mixed)
        .set_open(true)
        .finish()
        .unwrap();
    any.init_validation(&mut state);
    assert_eq!(any.validate_element(&QName::local("a"), &mut state), Ok(None));
    assert_eq!(
        any.validate_element(&QName::namespaced("urn:x", "b"), &mut state),
        Ok(None)
    );

    let mixed = ContentModelBuilder::new(ContentType::Mixed).finish().unwrap();
    assert_eq!(mixed.content_type(), ContentType::Mixed);
    assert!(!mixed.is_open());
}

#[test]
fn test_all_group() {
    // all(a?, b, c?)
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::optional());
    let b = arena.element(QName::local("b"), Occurs::once());
    let c = arena.element(QName::local("c"), Occurs::optional());
    let mut group = XsdGroup::new(ModelType::All);
    group.add_element(a);
    group.add_element(b);
    group.add_element(c);
    let validator = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();

    assert_eq!(validate(&validator, &[QName::local("b")]), Some(vec![Some(b)]));
    assert!(validate(&validator, &[]).is_none());
    assert_eq!(
        validate(&validator, &[QName::local("c"), QName::local("b"), QName::local("a")]),
        Some(vec![Some(c), Some(b), Some(a)])
    );

    let mut state = ValidationState::new();
    validator.init_validation(&mut state);
    assert_eq!(validator.validate_element(&QName::local("b"), &mut state), Ok(Some(b)));
    let duplicate = validator.validate_element(&QName::local("b"), &mut state);
    let unknown = validator.validate_element(&QName::local("d"), &mut state);
    assert_eq!(duplicate, Err(MatchError::Duplicate));
    assert_eq!(unknown, Err(MatchError::Unexpected));
    assert_ne!(MatchError::Duplicate.code(), MatchError::Unexpected.code());
}

#[test]
fn test_open_content() {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::once());
    let b = arena.element(QName::local("b"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Sequence);
    group.add_element(a);
    group.add_element(b);
    let builder = ContentModelBuilder::new(ContentType::ElementOnly).set_open(true);
    let validator = group.compile(&arena, builder, RangeStrategy::Counter).unwrap();
    assert!(validator.is_open());

    let input = [QName::local("a"), QName::local("b"), QName::local("z")];
    assert_eq!(validate(&validator, &input), Some(vec![Some(a), Some(b), None]));
    // nothing has matched yet, so the unknown element is an error
    assert!(validate(&validator, &[QName::local("z")]).is_none());
}

#[test]
fn test_expected_elements_and_particles() {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::optional());
    let b = arena.element(QName::local("b"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Sequence);
    group.add_element(a);
    group.add_element(b);
    let validator = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();

    let mut state = ValidationState::new();
    validator.init_validation(&mut state);
    assert_eq!(validator.expected_particles(&state, false), vec![a, b]);
    assert_eq!(validator.expected_elements(&state, false), vec!["a", "b"]);
}

#[test]
fn test_expanded_and_counted_ranges_agree() {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::new(1, Some(3)));
    let mut group = XsdGroup::new(ModelType::Sequence).with_occurs(Occurs::new(2, Some(2)));
    group.add_element(a);

    let counted = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();
    let expanded = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Expand)
        .unwrap();
    assert_eq!(counted.kind(), ValidatorKind::Range);
    assert_ne!(expanded.kind(), ValidatorKind::Range);
    assert_eq!(accepted_counts(&counted, 8), accepted_counts(&expanded, 8));
    assert_eq!(accepted_counts(&expanded, 8), vec![2, 3, 4, 5, 6]);
}

#[test]
fn test_dfa_budget_fallback_keeps_results() {
    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::zero_or_more());
    let b = arena.element(QName::local("b"), Occurs::once());
    let mut group = XsdGroup::new(ModelType::Sequence);
    group.add_element(a);
    group.add_element(b);

    let dfa = group
        .compile(&arena, ContentModelBuilder::new(ContentType::ElementOnly), RangeStrategy::Counter)
        .unwrap();
    let nfa = group
        .compile(
            &arena,
            ContentModelBuilder::new(ContentType::ElementOnly)
                .with_limits(Limits::new().with_dfa_time_constant(1)),
            RangeStrategy::Counter,
        )
        .unwrap();
    assert_eq!(dfa.kind(), ValidatorKind::Dfa);
    assert_eq!(nfa.kind(), ValidatorKind::Nfa);

    let input = [QName::local("a"), QName::local("a"), QName::local("b")];
    assert_eq!(validate(&dfa, &input), validate(&nfa, &input));
    assert!(validate(&nfa, &input).is_some());
}

#[test]
fn test_dump_round_trip() {
    let validator = range_of_a(2, Some(4));
    let dump = validator.dump();
    let json = dump.to_json().unwrap();
    assert!(json.contains("\"kind\": \"range\""));
    assert_eq!(ModelDump::from_json(&json).unwrap(), dump);

    let mut arena = ParticleArena::new();
    let a = arena.element(QName::local("a"), Occurs::once());
    let mut builder = ContentModelBuilder::new(ContentType::ElementOnly);
    builder.add_name(QName::local("a"), a);
    let dump = builder.finish().unwrap().dump();
    assert_eq!(dump.kind, ValidatorKind::Dfa);
    assert_eq!(dump.state_count(), 2);
    assert!(!dump.transitions[0].accepting);
    assert!(dump.transitions[1].accepting);
}

#[test]
fn test_validator_is_shared_across_threads() {
    let validator = range_of_a(1, Some(3));
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let validator = Arc::clone(&validator);
            std::thread::spawn(move || validate(&validator, &repeated("a", n)).is_some())
        })
        .collect();
    let results: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    assert_eq!(results, vec![false, true, true, true]);
}
