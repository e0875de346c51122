//! Property tests: the DFA and the NFA simulation of a model agree, and
//! validation is deterministic.

use std::sync::Arc;

use proptest::prelude::*;
use xmlschema_content::namespaces::QName;
use xmlschema_content::validators::{
    ContentModelBuilder, ContentType, ContentValidator, MatchResult, ModelType, Occurs,
    ParticleArena, ParticleId, RangeStrategy, ValidationState, ValidatorKind, XsdGroup,
};
use xmlschema_content::Limits;

const ALPHABET: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Model {
    Name(usize),
    Group(ModelType, Vec<Model>, Occurs),
}

fn occurs_strategy() -> impl Strategy<Value = Occurs> {
    prop_oneof![
        Just(Occurs::once()),
        Just(Occurs::optional()),
        Just(Occurs::zero_or_more()),
        Just(Occurs::one_or_more()),
    ]
}

fn model_strategy() -> impl Strategy<Value = Model> {
    let leaf = (0..ALPHABET.len()).prop_map(Model::Name);
    leaf.prop_recursive(4, 16, 4, |inner| {
        (
            prop_oneof![Just(ModelType::Sequence), Just(ModelType::Choice)],
            prop::collection::vec(inner, 1..4),
            occurs_strategy(),
        )
            .prop_map(|(model, children, occurs)| Model::Group(model, children, occurs))
    })
}

fn input_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..ALPHABET.len(), 0..8)
}

/// One particle per name keeps every model UPA-eligible
fn to_group(model: &Model, particles: &[ParticleId]) -> XsdGroup {
    match model {
        Model::Name(i) => {
            let mut group = XsdGroup::new(ModelType::Sequence);
            group.add_element(particles[*i]);
            group
        }
        Model::Group(model_type, children, occurs) => {
            let mut group = XsdGroup::new(*model_type).with_occurs(*occurs);
            for child in children {
                match child {
                    Model::Name(i) => group.add_element(particles[*i]),
                    nested => group.add_group(to_group(nested, particles)),
                }
            }
            group
        }
    }
}

fn compile(model: &Model, limits: Limits) -> Arc<dyn ContentValidator> {
    let mut arena = ParticleArena::new();
    let particles: Vec<_> = ALPHABET
        .iter()
        .map(|name| arena.element(QName::local(*name), Occurs::once()))
        .collect();
    let builder = ContentModelBuilder::new(ContentType::ElementOnly).with_limits(limits);
    to_group(model, &particles)
        .compile(&arena, builder, RangeStrategy::Counter)
        .expect("UPA-eligible model compiles")
}

fn run(validator: &Arc<dyn ContentValidator>, input: &[usize]) -> (Vec<MatchResult>, bool) {
    let mut state = ValidationState::new();
    validator.init_validation(&mut state);
    let mut results = Vec::new();
    for &i in input {
        let result = validator.validate_element(&QName::local(ALPHABET[i]), &mut state);
        let failed = result.is_err();
        results.push(result);
        if failed {
            return (results, false);
        }
    }
    (results, validator.complete_validation(&state))
}

proptest! {
    #[test]
    fn dfa_and_nfa_agree(model in model_strategy(), inputs in prop::collection::vec(input_strategy(), 1..6)) {
        let dfa = compile(&model, Limits::permissive());
        let nfa = compile(&model, Limits::new().with_dfa_time_constant(1));
        prop_assert_ne!(nfa.kind(), ValidatorKind::Range);
        prop_assert_eq!(dfa.is_emptiable(), nfa.is_emptiable());

        for input in &inputs {
            prop_assert_eq!(run(&dfa, input), run(&nfa, input), "input {:?}", input);
        }
    }

    #[test]
    fn validation_is_deterministic(model in model_strategy(), input in input_strategy()) {
        let validator = compile(&model, Limits::default());
        let first = run(&validator, &input);
        let again = run(&validator, &input);
        prop_assert_eq!(&first, &again);

        let recompiled = compile(&model, Limits::default());
        prop_assert_eq!(first, run(&recompiled, &input));
    }
}
