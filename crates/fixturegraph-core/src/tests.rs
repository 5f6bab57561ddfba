//! Unit tests for resolution, synthesis and the persistence driver

use super::*;
use fixturegraph_schema::{
    Annotation, Bean, MemberDef, Schema, Settable, TypeDescriptor, TypeRef, Value,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn context(schema: Schema) -> MakeContext {
    init_tracing();
    MakeContext::new(
        Arc::new(schema),
        BeanValueHolder::new(),
        PreferredValueMakers::new(),
    )
}

fn family_schema(children_start_empty: bool) -> Schema {
    let children = MemberDef::to_many("children", TypeRef::list(TypeRef::named("Child")));
    let children = if children_start_empty {
        children.starting_empty()
    } else {
        children
    };
    Schema::builder()
        .with(
            TypeDescriptor::entity("Parent")
                .id("id")
                .member(MemberDef::scalar("name", TypeRef::text()))
                .member(MemberDef::scalar("age", TypeRef::int()))
                .member(children),
        )
        .with(
            TypeDescriptor::entity("Child")
                .id("id")
                .member(MemberDef::required("parent", "Parent")),
        )
        .build()
        .unwrap()
}

fn type_names(sequence: &[Bean]) -> Vec<String> {
    sequence.iter().map(Bean::type_name).collect()
}

/// Records persist calls and hands out sequential ids.
#[derive(Default)]
struct RecordingContext {
    next_id: i64,
    log: Vec<String>,
    in_transaction: bool,
    commits: usize,
    reject: Option<String>,
}

impl PersistenceContext for RecordingContext {
    fn begin_transaction(&mut self) -> Result<(), PersistenceError> {
        self.in_transaction = true;
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), PersistenceError> {
        self.in_transaction = false;
        self.commits += 1;
        Ok(())
    }

    fn persist(&mut self, bean: &Bean) -> Result<(), PersistenceError> {
        assert!(self.in_transaction, "persist outside a transaction");
        let type_name = bean.type_name();
        if self.reject.as_deref() == Some(type_name.as_str()) {
            return Err(PersistenceError::Rejected {
                entity: type_name,
                reason: "rejected by test".to_string(),
            });
        }
        self.next_id += 1;
        bean.assign_id(Value::Int(self.next_id));
        self.log.push(type_name);
        Ok(())
    }
}

// ============================================================================
// Factory dispatch
// ============================================================================

#[test]
fn scalar_members_get_sequence_makers() {
    let ctx = context(family_schema(true));
    let factory = ValueMakerFactory::new(ctx);

    let maker = factory.from(&TypeRef::int(), None).unwrap();
    assert!(matches!(maker, ValueMaker::Number(_)));
    assert_eq!(maker.value().unwrap(), Value::Int(1));
    assert_eq!(maker.value().unwrap(), Value::Int(2));

    let maker = factory.from(&TypeRef::bool(), None).unwrap();
    assert_eq!(maker.value().unwrap(), Value::Bool(false));
    assert_eq!(maker.value().unwrap(), Value::Bool(true));
}

#[test]
fn text_respects_size_bounds() {
    let member =
        MemberDef::scalar("name", TypeRef::text()).annotated(Annotation::Size { min: 2, max: 4 });
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Tag").id("id").member(member.clone()))
        .build()
        .unwrap();
    let factory = ValueMakerFactory::new(context(schema));

    let settable = Settable::property("Tag", &member);
    for _ in 0..20 {
        let value = factory.from_settable(&settable).unwrap().value().unwrap();
        let len = value.as_text().unwrap().chars().count();
        assert!((2..=4).contains(&len), "length {len} out of bounds");
    }
}

#[test]
fn unsatisfiable_size_is_a_synthesis_error() {
    let member =
        MemberDef::scalar("code", TypeRef::text()).annotated(Annotation::Size { min: 5, max: 3 });
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Tag").id("id").member(member))
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));

    let err = maker.required_entities_for("Tag").unwrap_err();
    assert!(matches!(
        err,
        MakeError::Synthesis(SynthesisError::Constraint { ref member, .. }) if member == "Tag#code"
    ));
}

#[test]
fn enums_cycle_through_constants() {
    let schema = Schema::builder()
        .with(TypeDescriptor::enumeration("Language", ["English", "German"]))
        .build()
        .unwrap();
    let factory = ValueMakerFactory::new(context(schema));
    let maker = factory.from(&TypeRef::named("Language"), None).unwrap();

    let constants: Vec<String> = (0..3)
        .map(|_| match maker.value().unwrap() {
            Value::Enum { constant, .. } => constant,
            other => panic!("expected enum, got {other}"),
        })
        .collect();
    assert_eq!(constants, ["English", "German", "English"]);
}

#[test]
fn containers_are_left_to_back_fill() {
    let factory = ValueMakerFactory::new(context(family_schema(true)));
    for ty in [
        TypeRef::array(TypeRef::int()),
        TypeRef::list(TypeRef::named("Child")),
        TypeRef::map(TypeRef::text(), TypeRef::named("Child")),
    ] {
        let maker = factory.from(&ty, None).unwrap();
        assert!(matches!(maker, ValueMaker::Null(_)), "{ty}");
        assert!(maker.value().unwrap().is_null());
    }
}

#[test]
fn entity_references_reuse_or_stay_null() {
    let ctx = context(family_schema(true));
    let factory = ValueMakerFactory::new(ctx.clone());
    let maker = factory.from(&TypeRef::named("Parent"), None).unwrap();
    assert!(matches!(maker, ValueMaker::ReuseOrNull(_)));
    assert!(maker.value().unwrap().is_null());

    let parent = Bean::new("Parent", Some("id".to_string()));
    ctx.bean_value_holder()
        .put(TypeRef::named("Parent"), parent.clone());
    assert_eq!(maker.value().unwrap().as_bean(), Some(&parent));
}

#[test]
fn optional_reference_is_never_synthesized() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Toy").id("id"))
        .with(
            TypeDescriptor::entity("Kid")
                .id("id")
                .member(MemberDef::optional("favourite", "Toy")),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));

    let sequence = maker.required_entities_for("Kid").unwrap();
    assert_eq!(type_names(&sequence), ["Kid"]);
    assert!(sequence[0].get("favourite").is_null());

    let toy = Bean::new("Toy", Some("id".to_string()));
    maker
        .context()
        .bean_value_holder()
        .put(TypeRef::named("Toy"), toy.clone());
    let sequence = maker.required_entities_for("Kid").unwrap();
    assert_eq!(sequence[0].get("favourite").as_bean(), Some(&toy));
}

#[test]
fn unclassified_entity_member_is_required() {
    let schema = Schema::from_json_str(
        r#"{ "types": [
            { "name": "Parent", "kind": "entity",
              "members": [ { "name": "id", "type": "Long", "annotations": ["id"] } ] },
            { "name": "Child", "kind": "entity",
              "members": [
                { "name": "id", "type": "Long", "annotations": ["id"] },
                { "name": "parent", "type": "Parent" }
              ] }
        ] }"#,
    )
    .unwrap();
    let maker = EntityMaker::new(context(schema));

    let sequence = maker.required_entities_for("Child").unwrap();
    assert_eq!(type_names(&sequence), ["Parent", "Child"]);
    assert_eq!(sequence[1].get("parent").as_bean(), Some(&sequence[0]));
}

#[test]
fn embeddables_are_synthesized_in_place() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::embeddable("Address")
                .member(MemberDef::scalar("street", TypeRef::text())),
        )
        .with(
            TypeDescriptor::entity("Shop")
                .id("id")
                .member(MemberDef::embedded("address", "Address")),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));

    let sequence = maker.required_entities_for("Shop").unwrap();
    assert_eq!(sequence.len(), 1, "embeddables are not separate entries");
    let address = sequence[0].get("address");
    let address = address.as_bean().unwrap();
    assert!(address.is_of("Address"));
    assert!(address.get("street").as_text().is_some());
    assert!(sequence[0].is_unsaved());
}

#[test]
fn recursive_embedding_fails() {
    let schema = Schema::builder()
        .with(TypeDescriptor::embeddable("Node").member(MemberDef::embedded("next", "Node")))
        .with(
            TypeDescriptor::entity("Tree")
                .id("id")
                .member(MemberDef::embedded("root", "Node")),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));

    let err = maker.required_entities_for("Tree").unwrap_err();
    assert!(matches!(
        err,
        MakeError::Synthesis(SynthesisError::RecursiveEmbedding { ref path })
            if path == &["Tree".to_string(), "Node".to_string(), "Node".to_string()]
    ));
}

#[test]
fn embedding_depth_counts_nested_records_only() {
    let schema = Schema::builder()
        .with(TypeDescriptor::embeddable("Stamp").member(MemberDef::scalar("at", TypeRef::int())))
        .with(TypeDescriptor::entity("Note").id("id"))
        .with(
            TypeDescriptor::entity("Letter")
                .id("id")
                .member(MemberDef::embedded("stamp", "Stamp")),
        )
        .build()
        .unwrap();
    let flat = MakerConfig {
        max_embedding_depth: 0,
        ..MakerConfig::default()
    };
    let maker = EntityMaker::new(context(schema.clone()).with_config(flat));

    let sequence = maker.required_entities_for("Note").unwrap();
    assert_eq!(type_names(&sequence), ["Note"]);
    assert!(matches!(
        maker.required_entities_for("Letter").unwrap_err(),
        MakeError::Synthesis(SynthesisError::RecursiveEmbedding { .. })
    ));

    let shallow = MakerConfig {
        max_embedding_depth: 1,
        ..MakerConfig::default()
    };
    let maker = EntityMaker::new(context(schema).with_config(shallow));
    let sequence = maker.required_entities_for("Letter").unwrap();
    assert!(sequence[0].get("stamp").as_bean().is_some());
}

#[test]
fn abstract_member_needs_a_preferred_maker() {
    let schema = Schema::builder()
        .with(TypeDescriptor::abstract_type("Animal"))
        .with(
            TypeDescriptor::entity("Zoo")
                .id("id")
                .member(MemberDef::embedded("mascot", "Animal")),
        )
        .build()
        .unwrap();

    let maker = EntityMakerBuilder::new(schema.clone()).build();
    let err = maker.required_entities_for("Zoo").unwrap_err();
    assert!(matches!(
        err,
        MakeError::Resolution(ResolutionError::NotInstantiable { ref name, .. }) if name == "Animal"
    ));

    let maker = EntityMakerBuilder::new(schema)
        .add_field_or_property_maker("Zoo", "mascot", FixedValueMaker::text("Lion"))
        .build();
    let sequence = maker.required_entities_for("Zoo").unwrap();
    assert_eq!(sequence[0].get("mascot"), Value::Text("Lion".to_string()));
}

#[test]
fn constructor_parameters_fill_bound_members() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::entity("Point")
                .id("id")
                .member(MemberDef::scalar("x", TypeRef::int()))
                .member(MemberDef::scalar("label", TypeRef::text()))
                .constructor_param(TypeRef::int(), "x"),
        )
        .build()
        .unwrap();
    let maker = EntityMakerBuilder::new(schema)
        .add_constructor_parameter_maker("Point", 0, || -> MakeResult<Value> {
            Ok(Value::Int(7))
        })
        .build();

    let point = maker.make_and_persist(&mut RecordingContext::default(), "Point").unwrap();
    assert_eq!(point.get("x"), Value::Int(7));
    assert!(point.get("label").as_text().is_some());
    assert_eq!(point.id(), Value::Int(1));
}

#[test]
fn failing_preferred_maker_propagates() {
    let maker = EntityMakerBuilder::new(family_schema(true))
        .add_preferred_maker(NamePattern::contains("#name"), || -> MakeResult<Value> {
            Err(SynthesisError::Custom("no names today".to_string()).into())
        })
        .build();
    let err = maker.required_entities_for("Child").unwrap_err();
    assert!(matches!(err, MakeError::Synthesis(SynthesisError::Custom(_))));
}

// ============================================================================
// Registry and cache
// ============================================================================

#[test]
fn first_matching_rule_wins() {
    let registry = PreferredValueMakers::new();
    registry
        .add(NamePattern::exact("Parent#name"), FixedValueMaker::text("exact"))
        .add(NamePattern::contains("name"), FixedValueMaker::text("contains"))
        .add(NamePattern::regex(r"^Child\(arg\d+\)$").unwrap(), SequenceMaker::new("arg"));

    let found = registry.find("Parent#name").unwrap();
    assert_eq!(found.value().unwrap(), Value::Text("exact".to_string()));
    assert_eq!(found.pattern(), "== Parent#name");

    let found = registry.find("Child#nickname").unwrap();
    assert_eq!(found.value().unwrap(), Value::Text("contains".to_string()));

    let found = registry.find("Child(arg0)").unwrap();
    assert_eq!(found.value().unwrap(), Value::Text("arg1".to_string()));
    assert_eq!(found.value().unwrap(), Value::Text("arg2".to_string()));

    assert!(registry.find("Parent#age").is_none());
    assert_eq!(registry.len(), 3);
    registry.clear();
    assert!(registry.is_empty());
    assert!(registry.find("Parent#name").is_none());
}

#[test]
fn preferred_maker_overrides_property() {
    let maker = EntityMakerBuilder::new(family_schema(true))
        .add_field_or_property_maker("Parent", "name", FixedValueMaker::text("Ada"))
        .build();
    let sequence = maker.required_entities_for("Child").unwrap();
    assert_eq!(sequence[0].get("name"), Value::Text("Ada".to_string()));
}

#[test]
fn holder_never_caches_absence() {
    let holder = BeanValueHolder::new();
    holder.put_if_not_null(TypeRef::named("Parent"), &Value::Null);
    assert!(holder.is_empty());

    let parent = Bean::new("Parent", Some("id".to_string()));
    holder.put_if_not_null(TypeRef::named("Parent"), &Value::Bean(parent.clone()));
    assert_eq!(holder.try_get_named("Parent"), Some(parent));
}

#[test]
fn holder_keys_on_the_full_witness() {
    let holder = BeanValueHolder::new();
    let list = Bean::new("Wrapper", None);
    holder.put(TypeRef::list(TypeRef::named("Child")), list.clone());
    assert!(holder.try_get(&TypeRef::set(TypeRef::named("Child"))).is_none());
    assert!(holder.try_get_named("Child").is_none());
    assert_eq!(holder.try_get(&TypeRef::list(TypeRef::named("Child"))), Some(list));
}

#[test]
fn exported_snapshot_is_independent() {
    let maker = EntityMaker::new(context(family_schema(true)));
    maker.required_entities_for("Child").unwrap();

    let snapshot = maker.export_copy_of_beans();
    assert_eq!(snapshot.len(), 2);
    let parent = snapshot.try_get_named("Parent").unwrap();

    snapshot.clear();
    snapshot.put(
        TypeRef::named("Parent"),
        Bean::new("Parent", Some("id".to_string())),
    );

    let live = maker.context().bean_value_holder();
    assert_eq!(live.len(), 2);
    assert_eq!(live.try_get_named("Parent"), Some(parent.clone()));

    let sequence = maker.required_entities_for("Child").unwrap();
    assert_eq!(sequence[0], parent);
}

#[test]
fn config_loads_with_defaults_for_missing_fields() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{ "always_new_types": ["Audit"], "max_embedding_depth": 2 }"#)
        .unwrap();
    let config = MakerConfig::load(file.path()).unwrap();
    let expected = MakerConfig {
        max_embedding_depth: 2,
        ..MakerConfig::default().always_new("Audit")
    };
    assert_eq!(config, expected);

    let broken = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(broken.path(), "{ not json").unwrap();
    let err = MakerConfig::load(broken.path()).unwrap_err();
    assert!(err.to_string().contains("failed to parse maker config"));
}

// ============================================================================
// Scanner
// ============================================================================

fn diamond_schema() -> Schema {
    Schema::builder()
        .with(TypeDescriptor::entity("D").id("id"))
        .with(TypeDescriptor::entity("A").id("id").member(MemberDef::required("d", "D")))
        .with(TypeDescriptor::entity("B").id("id").member(MemberDef::required("d", "D")))
        .with(
            TypeDescriptor::entity("T")
                .id("id")
                .member(MemberDef::required("a", "A"))
                .member(MemberDef::required("b", "B")),
        )
        .build()
        .unwrap()
}

fn scanner(schema: Schema) -> EntityClassScanner {
    EntityClassScanner::new(context(schema))
}

#[test]
fn scan_lists_dependencies_first_without_root() {
    let classes = scanner(diamond_schema()).scan("T").unwrap();
    let names: Vec<&str> = classes.iter().map(EntityClass::type_name).collect();
    assert_eq!(names, ["D", "A", "B"]);
    assert_eq!(classes[1].depending_types(), ["D"]);
    assert!(classes[0].depending_types().is_empty());
}

#[test]
fn depending_types_keep_duplicates() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Person").id("id"))
        .with(
            TypeDescriptor::entity("Transfer")
                .id("id")
                .member(MemberDef::required("from", "Person"))
                .member(MemberDef::required("to", "Person")),
        )
        .build()
        .unwrap();
    let scanner = scanner(schema);
    let transfer = scanner.entity_class("Transfer").unwrap();
    assert_eq!(transfer.depending_types(), ["Person", "Person"]);
    assert_eq!(scanner.scan("Transfer").unwrap().len(), 1);
}

#[test]
fn self_references_do_not_traverse() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::entity("Employee")
                .id("id")
                .member(MemberDef::required("manager", "Employee"))
                .member(MemberDef::optional("mentor", "Employee")),
        )
        .build()
        .unwrap();
    assert!(scanner(schema.clone()).scan("Employee").unwrap().is_empty());

    let maker = EntityMaker::new(context(schema));
    let sequence = maker.required_entities_for("Employee").unwrap();
    assert_eq!(type_names(&sequence), ["Employee"]);
}

#[test]
fn required_cycle_is_reported() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("A").id("id").member(MemberDef::required("b", "B")))
        .with(TypeDescriptor::entity("B").id("id").member(MemberDef::required("a", "A")))
        .build()
        .unwrap();
    let err = scanner(schema).scan("A").unwrap_err();
    match err {
        MakeError::Resolution(ResolutionError::CyclicRequirement { path }) => {
            assert_eq!(path, ["A", "B", "A"]);
        }
        other => panic!("expected cycle, got {other}"),
    }
}

#[test]
fn abstract_reference_target_is_unresolvable() {
    let schema = Schema::builder()
        .with(TypeDescriptor::abstract_type("Animal"))
        .with(
            TypeDescriptor::entity("Keeper")
                .id("id")
                .member(MemberDef::required("animal", "Animal")),
        )
        .build()
        .unwrap();
    let scanner = scanner(schema);

    let err = scanner.scan("Keeper").unwrap_err();
    assert!(matches!(
        err,
        MakeError::Resolution(ResolutionError::UnresolvableReference { ref target, .. })
            if target == "Animal"
    ));
    assert!(matches!(
        scanner.scan("Animal").unwrap_err(),
        MakeError::Resolution(ResolutionError::NotInstantiable { .. })
    ));
    assert!(matches!(
        scanner.scan("Nowhere").unwrap_err(),
        MakeError::Resolution(ResolutionError::UnknownType(_))
    ));
}

#[test]
fn abstract_reference_target_with_preferred_maker_resolves() {
    let schema = Schema::builder()
        .with(TypeDescriptor::abstract_type("Animal"))
        .with(
            TypeDescriptor::entity("Keeper")
                .id("id")
                .member(MemberDef::required("animal", "Animal")),
        )
        .build()
        .unwrap();
    let lion = Bean::new("Lion", Some("id".to_string()));
    let maker = EntityMakerBuilder::new(schema)
        .add_field_or_property_maker(
            "Keeper",
            "animal",
            FixedValueMaker::new(Value::Bean(lion.clone())),
        )
        .build();

    let sequence = maker.required_entities_for("Keeper").unwrap();
    assert_eq!(type_names(&sequence), ["Keeper"]);
    assert_eq!(sequence[0].get("animal").as_bean(), Some(&lion));
}

#[test]
fn entity_class_lists_every_element() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::entity("Point")
                .id("id")
                .member(MemberDef::scalar("x", TypeRef::int()))
                .member(MemberDef::scalar("label", TypeRef::text()))
                .constructor_param(TypeRef::int(), "x"),
        )
        .build()
        .unwrap();
    let point = scanner(schema).entity_class("Point").unwrap();
    let names: Vec<String> = point
        .elements()
        .iter()
        .map(Settable::fully_qualified_name)
        .collect();
    assert_eq!(names, ["Point(arg0)", "Point#id", "Point#label"]);
}

#[test]
fn containing_accessors_resolve_witnesses() {
    let scanner = scanner(family_schema(true));
    let parent = scanner.entity_class("Parent").unwrap();
    let accessors = parent.containing_accessors();
    assert_eq!(accessors.len(), 1);
    assert_eq!(accessors[0].member(), "children");
    assert_eq!(
        accessors[0].shape,
        ContainingShape::Collection {
            kind: fixturegraph_schema::CollectionKind::List,
            element: TypeRef::named("Child"),
        }
    );
    assert!(scanner
        .entity_class("Child")
        .unwrap()
        .containing_accessors()
        .is_empty());
}

// ============================================================================
// Resolution laws
// ============================================================================

#[test]
fn scalar_only_type_resolves_to_itself() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::entity("Note")
                .id("id")
                .member(MemberDef::scalar("body", TypeRef::text()))
                .member(MemberDef::scalar("written", TypeRef::date())),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let sequence = maker.required_entities_for("Note").unwrap();
    assert_eq!(type_names(&sequence), ["Note"]);
    assert!(matches!(sequence[0].get("written"), Value::Date(_)));
    assert!(sequence[0].id().is_null(), "id members are left to storage");
}

#[test]
fn dependency_precedes_dependent() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("D").id("id"))
        .with(TypeDescriptor::entity("T").id("id").member(MemberDef::required("d", "D")))
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let sequence = maker.required_entities_for("T").unwrap();
    assert_eq!(type_names(&sequence), ["D", "T"]);
    assert_eq!(sequence[1].get("d").as_bean(), Some(&sequence[0]));
}

#[test]
fn shared_dependency_is_reused() {
    let maker = EntityMaker::new(context(diamond_schema()));
    let sequence = maker.required_entities_for("T").unwrap();
    assert_eq!(type_names(&sequence), ["D", "A", "B", "T"]);

    let d_of_a = sequence[1].get("d");
    let d_of_b = sequence[2].get("d");
    assert_eq!(d_of_a.as_bean(), Some(&sequence[0]));
    assert_eq!(d_of_a, d_of_b);
}

#[test]
fn seeded_instance_is_reused() {
    let seeded = Bean::new("D", Some("id".to_string()));
    let maker = EntityMakerBuilder::new(diamond_schema())
        .reuse_entity(&seeded)
        .build();
    let sequence = maker.required_entities_for("A").unwrap();
    assert_eq!(sequence[0], seeded);
    assert_eq!(sequence[1].get("d").as_bean(), Some(&seeded));
}

#[test]
fn always_new_type_is_never_reused() {
    let seeded = Bean::new("D", Some("id".to_string()));
    let maker = EntityMakerBuilder::new(diamond_schema())
        .reuse_entity(&seeded)
        .always_new("D")
        .build();

    let first = maker.required_entities_for("A").unwrap();
    assert!(!first[0].same(&seeded));
    assert_eq!(first[1].get("d").as_bean(), Some(&first[0]));

    let second = maker.required_entities_for("A").unwrap();
    assert!(!second[0].same(&first[0]));
    let cached = maker.context().bean_value_holder().try_get_named("D");
    assert_eq!(cached, Some(second[0].clone()), "new instances still update the cache");
}

#[test]
fn schema_flag_forces_new_instance() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Audit").id("id").require_new_instance())
        .with(TypeDescriptor::entity("Order").id("id").member(MemberDef::required("audit", "Audit")))
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let first = maker.required_entities_for("Order").unwrap();
    let second = maker.required_entities_for("Order").unwrap();
    assert!(!first[0].same(&second[0]));
}

#[test]
fn root_is_always_new() {
    let maker = EntityMaker::new(context(family_schema(true)));
    let first = maker.required_entities_for("Parent").unwrap();
    let second = maker.required_entities_for("Parent").unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].same(&second[0]));
}

// ============================================================================
// Back-fill
// ============================================================================

#[test]
fn parent_children_end_to_end() {
    let maker = EntityMaker::new(context(family_schema(true)));

    let sequence = maker.required_entities_for("Child").unwrap();
    assert_eq!(type_names(&sequence), ["Parent", "Child"]);
    let (parent, child) = (&sequence[0], &sequence[1]);
    assert_eq!(child.get("parent").as_bean(), Some(parent));
    assert_eq!(parent.get("children").as_list(), Some(&[Value::Bean(child.clone())][..]));

    let again = maker.required_entities_for("Child").unwrap();
    assert_eq!(again.len(), 2);
    assert!(again[0].same(parent), "parent is reused");
    let second_child = &again[1];
    assert!(!second_child.same(child));

    let children = parent.get("children");
    let children = children.as_list().unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].as_bean(), Some(second_child));
}

#[test]
fn null_collection_is_left_alone() {
    let maker = EntityMaker::new(context(family_schema(false)));
    let sequence = maker.required_entities_for("Child").unwrap();
    assert!(sequence[0].get("children").is_null());
}

#[test]
fn back_fill_does_not_duplicate() {
    let schema = Schema::builder()
        .with(
            TypeDescriptor::entity("Parent")
                .id("id")
                .member(
                    MemberDef::to_many("children", TypeRef::list(TypeRef::named("Child")))
                        .starting_empty(),
                ),
        )
        .with(
            TypeDescriptor::entity("Child")
                .id("id")
                .member(MemberDef::required("parent", "Parent")),
        )
        .with(
            TypeDescriptor::entity("Toy")
                .id("id")
                .member(MemberDef::required("owner", "Child")),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let first = maker.required_entities_for("Child").unwrap();

    // Parent and Child are both reused, so Parent's back-fill sees the same Child
    let second = maker.required_entities_for("Toy").unwrap();
    assert_eq!(type_names(&second), ["Parent", "Child", "Toy"]);
    assert!(second[1].same(&first[1]));

    let children = first[0].get("children");
    assert_eq!(children.as_list().unwrap().len(), 1);
}

fn library_schema() -> Schema {
    Schema::builder()
        .with(TypeDescriptor::entity("Shelf").id("id"))
        .with(TypeDescriptor::entity("Genre").id("id"))
        .with(
            TypeDescriptor::entity("Library")
                .id("id")
                .member(
                    MemberDef::to_many(
                        "by_shelf",
                        TypeRef::map(TypeRef::named("Shelf"), TypeRef::named("Book")),
                    )
                    .starting_empty(),
                )
                .member(
                    MemberDef::to_many(
                        "by_genre",
                        TypeRef::map(TypeRef::named("Genre"), TypeRef::named("Book")),
                    )
                    .starting_empty(),
                ),
        )
        .with(
            TypeDescriptor::entity("Book")
                .id("id")
                .member(MemberDef::required("library", "Library"))
                .member(MemberDef::required("shelf", "Shelf")),
        )
        .build()
        .unwrap()
}

#[test]
fn map_back_fill_pairs_cached_key_and_value() {
    let maker = EntityMaker::new(context(library_schema()));
    let sequence = maker.required_entities_for("Book").unwrap();
    assert_eq!(type_names(&sequence), ["Library", "Shelf", "Book"]);
    let (library, shelf, book) = (&sequence[0], &sequence[1], &sequence[2]);

    let by_shelf = library.get("by_shelf");
    let entries = by_shelf.as_map().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0.as_bean(), Some(shelf));
    assert_eq!(entries[0].1.as_bean(), Some(book));

    // no Genre was ever cached: warned, left empty
    assert_eq!(library.get("by_genre").as_map().map(<[_]>::len), Some(0));
}

#[test]
fn map_back_fill_replaces_existing_key() {
    let maker = EntityMaker::new(context(library_schema()));
    let first = maker.required_entities_for("Book").unwrap();
    let second = maker.required_entities_for("Book").unwrap();
    assert!(first[0].same(&second[0]));

    let by_shelf = first[0].get("by_shelf");
    let entries = by_shelf.as_map().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.as_bean(), Some(&second[2]));
}

// ============================================================================
// Persistence driver
// ============================================================================

#[test]
fn persists_dependencies_first_and_skips_saved() {
    let maker = EntityMaker::new(context(family_schema(true)));
    let mut ctx = RecordingContext::default();

    let child = maker.make_and_persist(&mut ctx, "Child").unwrap();
    assert_eq!(ctx.log, ["Parent", "Child"]);
    assert_eq!(ctx.commits, 1);
    assert_eq!(child.id(), Value::Int(2));
    assert_eq!(child.get("parent").as_bean().unwrap().id(), Value::Int(1));

    let second = maker.make_and_persist(&mut ctx, "Child").unwrap();
    assert_eq!(ctx.log, ["Parent", "Child", "Child"], "saved parent is not re-persisted");
    assert_eq!(second.id(), Value::Int(3));
}

#[test]
fn pre_saved_entities_never_reach_persist() {
    let saved = Bean::new("Parent", Some("id".to_string()));
    saved.assign_id(Value::Int(99));
    let maker = EntityMakerBuilder::new(family_schema(true))
        .reuse_entity(&saved)
        .build();

    let mut ctx = RecordingContext::default();
    let child = maker.make_and_persist(&mut ctx, "Child").unwrap();
    assert_eq!(ctx.log, ["Child"]);
    assert_eq!(child.get("parent").as_bean(), Some(&saved));
}

#[test]
fn rejected_persist_leaves_transaction_open() {
    let maker = EntityMaker::new(context(family_schema(true)));
    let mut ctx = RecordingContext {
        reject: Some("Child".to_string()),
        ..Default::default()
    };

    let err = maker.make_and_persist(&mut ctx, "Child").unwrap_err();
    assert!(matches!(err, MakeError::Persistence(PersistenceError::Rejected { .. })));
    assert!(ctx.in_transaction);
    assert_eq!(ctx.commits, 0);
    assert_eq!(ctx.log, ["Parent"]);
}

#[test]
fn resolution_error_never_opens_a_transaction() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("A").id("id").member(MemberDef::required("b", "B")))
        .with(TypeDescriptor::entity("B").id("id").member(MemberDef::required("a", "A")))
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let mut ctx = RecordingContext::default();

    assert!(maker.make_and_persist(&mut ctx, "A").is_err());
    assert!(!ctx.in_transaction);
    assert!(ctx.log.is_empty());
}

#[test]
fn take_copy_captures_pre_persist_sequence() {
    let maker = EntityMaker::new(context(family_schema(true)));
    let mut ctx = RecordingContext::default();
    let mut copy = TakeCopyCallback::new();

    let child = maker.make_and_persist_with(&mut ctx, "Child", &mut copy).unwrap();
    assert_eq!(copy.copy().len(), 2);
    assert_eq!(copy.get_by_index(1), Some(&child));
    assert!(copy.get_by_type("Parent").unwrap().same(copy.get_by_index(0).unwrap()));
    assert!(copy.get_by_type("Toy").is_none());
    assert_eq!(ctx.log, ["Parent", "Child"]);
}

struct DropAll;

impl Callback for DropAll {
    fn after_persist(
        &mut self,
        _context: &mut dyn PersistenceContext,
        _persisted: Vec<Bean>,
    ) -> Vec<Bean> {
        Vec::new()
    }
}

#[test]
fn callback_removing_root_is_an_error() {
    let maker = EntityMaker::new(context(family_schema(true)));
    let mut ctx = RecordingContext::default();
    let err = maker
        .make_and_persist_with(&mut ctx, "Child", &mut DropAll)
        .unwrap_err();
    assert!(matches!(err, MakeError::RootMissing(ref name) if name == "Child"));
    assert_eq!(ctx.commits, 1);
}

#[test]
fn wire_many_to_many_adds_target_once() {
    let schema = Schema::builder()
        .with(TypeDescriptor::entity("Course").id("id"))
        .with(
            TypeDescriptor::entity("Student")
                .id("id")
                .member(
                    MemberDef::to_many("courses", TypeRef::set(TypeRef::named("Course")))
                        .starting_empty(),
                ),
        )
        .build()
        .unwrap();
    let maker = EntityMaker::new(context(schema));
    let mut ctx = RecordingContext::default();

    let course = maker.make_and_persist(&mut ctx, "Course").unwrap();
    let mut wire = WireManyToManyCallback::new("Student", "courses", course.clone());
    let student = maker
        .make_and_persist_with(&mut ctx, "Student", &mut wire)
        .unwrap();
    assert_eq!(
        student.get("courses").as_list(),
        Some(&[Value::Bean(course.clone())][..])
    );

    let mut seq = vec![student.clone()];
    seq = wire.before_persist(&mut ctx, seq);
    assert_eq!(seq.len(), 1);
    assert_eq!(student.get("courses").as_list().map(<[_]>::len), Some(1));
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
struct DagCase {
    /// `edges[i][j]` for `j < i`: type `T{i}` requires `T{j}`.
    edges: Vec<Vec<bool>>,
}

fn dag_strategy() -> impl Strategy<Value = DagCase> {
    (1usize..=8)
        .prop_flat_map(|n| prop::collection::vec(prop::collection::vec(any::<bool>(), n), n))
        .prop_map(|edges| DagCase { edges })
}

fn dag_schema(case: &DagCase) -> Schema {
    let mut builder = Schema::builder();
    for (i, row) in case.edges.iter().enumerate() {
        let mut descriptor = TypeDescriptor::entity(format!("T{i}")).id("id");
        for (j, _) in row.iter().enumerate().take(i).filter(|(_, edge)| **edge) {
            descriptor = descriptor.member(MemberDef::required(format!("r{j}"), format!("T{j}")));
        }
        builder = builder.with(descriptor);
    }
    builder.build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn sequence_respects_required_references(case in dag_strategy()) {
        let schema = dag_schema(&case);
        let root = format!("T{}", case.edges.len() - 1);
        let maker = EntityMaker::new(context(schema.clone()));
        let sequence = maker.required_entities_for(&root).unwrap();

        prop_assert!(sequence.last().unwrap().is_of(&root));

        let mut position: HashMap<String, usize> = HashMap::new();
        for (p, bean) in sequence.iter().enumerate() {
            prop_assert!(position.insert(bean.type_name(), p).is_none(), "type listed twice");
        }
        for (p, bean) in sequence.iter().enumerate() {
            for (member, target) in schema.required_references(&bean.type_name()) {
                let referenced = bean.get(&member.name);
                let referenced = referenced.as_bean();
                prop_assert!(referenced.is_some(), "{}#{} unset", bean.type_name(), member.name);
                prop_assert!(referenced.unwrap().is_of(target));
                prop_assert!(position[target] < p);
            }
        }

        let mut ctx = RecordingContext::default();
        maker.make_and_persist(&mut ctx, &root).unwrap();
        prop_assert_eq!(ctx.log.last().map(String::as_str), Some(root.as_str()));
        // the cached dependencies were never saved, so all of them are persisted again
        prop_assert_eq!(ctx.log.len(), sequence.len());
    }
}
