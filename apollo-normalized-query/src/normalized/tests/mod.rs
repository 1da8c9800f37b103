use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::executable;
use apollo_compiler::executable::Selection;
use apollo_compiler::name;
use apollo_compiler::parser::Parser;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json_bytes::json;
use tracing_test::traced_test;

use super::FieldCoordinates;
use super::NamedFragments;
use super::NormalizedFieldId;
use super::NormalizedQuery;
use crate::JsonMap;
use crate::NormalizationError;
use crate::NormalizerConfig;
use crate::QueryNormalizer;
use crate::schema::QuerySchema;
use crate::values::NormalizedValue;

const SCHEMA: &str = r#"
type Query {
  name: String
  animal: Animal
  pets: [Pet]
  search(term: String): [SearchResult]
  dog(id: ID!): Dog
}

interface Animal {
  name: String
  sound(volume: Int): String
}

interface Pet {
  name: String
  owner: Person
}

type Dog implements Animal & Pet {
  name: String
  sound(volume: Int): String
  bark(loud: Boolean = false): String
  owner: Person
}

type Cat implements Animal & Pet {
  name: String
  sound(volume: Int): String
  meow: String
  owner: Person
}

type Person {
  name: String
  pets: [Pet]
}

union SearchResult = Dog | Person
"#;

fn parse_schema_and_operation(query: &str) -> (QuerySchema, ExecutableDocument) {
    let schema_and_operation = format!("{SCHEMA}\n{query}");
    let (schema, executable_document) = Parser::new()
        .parse_mixed_validate(schema_and_operation, "document.graphql")
        .unwrap();
    (QuerySchema::new(schema), executable_document.into_inner())
}

fn variables(value: serde_json_bytes::Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

fn normalize_with_config(
    query: &str,
    coerced_variables: serde_json_bytes::Value,
    config: NormalizerConfig,
) -> Result<NormalizedQuery, NormalizationError> {
    let (schema, document) = parse_schema_and_operation(query);
    QueryNormalizer::new(schema, config).normalize(&document, None, &variables(coerced_variables))
}

fn normalize_with_variables(
    query: &str,
    coerced_variables: serde_json_bytes::Value,
) -> NormalizedQuery {
    normalize_with_config(query, coerced_variables, NormalizerConfig::default()).unwrap()
}

fn normalize(query: &str) -> NormalizedQuery {
    normalize_with_variables(query, json!({}))
}

fn find(query: &NormalizedQuery, response_key: &str) -> NormalizedFieldId {
    query
        .iter()
        .find(|(_, field)| field.response_key() == response_key)
        .map(|(id, _)| id)
        .unwrap()
}

fn first_field(selection_set: &executable::SelectionSet) -> &Node<executable::Field> {
    match &selection_set.selections[0] {
        Selection::Field(field) => field,
        _ => panic!("expected a field"),
    }
}

#[test]
fn single_root_field() {
    let query = normalize("{ name }");
    assert_snapshot!(query, @"Query.name");

    assert_eq!(query.len(), 1);
    let id = query.top_level_fields()[0];
    let field = query.field(id);
    assert_eq!(field.field_name(), "name");
    assert_eq!(field.depth(), 1);
    assert_eq!(field.object_type_names().len(), 1);
    assert!(field.object_type_names().contains("Query"));
    assert!(field.is_top_level());
    assert!(field.children().is_empty());
    assert_eq!(field.field_type().to_string(), "String");
}

#[test]
fn aliases_are_separate_fields() {
    let query = normalize("{ a: name b: name }");
    assert_snapshot!(query, @r###"
    a: Query.name
    b: Query.name
    "###);
    assert_eq!(query.len(), 2);
    assert_eq!(query.field(query.top_level_fields()[0]).alias(), Some(&name!("a")));
}

#[test]
fn merges_fields_across_type_conditions() {
    let query = normalize("{ animal { ... on Dog { sound } ... on Cat { sound } } }");
    assert_snapshot!(query, @r###"
    Query.animal
      [Dog, Cat].sound
    "###);

    let sound = find(&query, "sound");
    assert_eq!(query.merged_field(sound).len(), 2);
    assert_eq!(query.merged_field(sound).name(), "sound");
    assert_eq!(query.parent(sound), Some(query.top_level_fields()[0]));
    assert_eq!(query.field(sound).depth(), 2);
}

#[test]
fn identical_selections_merge_into_one_field() {
    let query = normalize("{ name name ... on Query { name } }");
    assert_snapshot!(query, @"Query.name");
    let name = query.top_level_fields()[0];
    assert_eq!(query.merged_field(name).len(), 3);
}

#[test]
fn narrows_to_object_type() {
    let query = normalize("{ animal { ... on Dog { bark } } }");
    assert_snapshot!(query, @r###"
    Query.animal
      Dog.bark
    "###);
}

#[test]
fn prunes_unreachable_branches() {
    let query = normalize(
        r#"
        {
          animal {
            ... on Dog {
              ... on Pet {
                ... on Cat {
                  meow
                  ... on Animal { name }
                }
              }
            }
          }
        }
        "#,
    );
    assert_snapshot!(query, @"Query.animal");
    assert_eq!(query.len(), 1);
}

#[test]
fn pruned_branches_stay_pruned_through_fragment_spreads() {
    let query = normalize(
        r#"
        {
          animal { ... on Dog { ... on Pet { ... on Cat { ...AnimalName } } } }
        }
        fragment AnimalName on Animal { name }
        "#,
    );
    assert_snapshot!(query, @"Query.animal");
    assert!(query.children(query.top_level_fields()[0]).is_empty());
}

#[test]
fn skips_fields_statically() {
    let query = normalize_with_variables(
        "query($cond: Boolean!) { name @skip(if: $cond) }",
        json!({ "cond": true }),
    );
    assert!(query.is_empty());
    assert!(query.top_level_fields().is_empty());
    assert_eq!(query.to_string(), "");

    let query = normalize_with_variables(
        "query($cond: Boolean!) { name @skip(if: $cond) }",
        json!({ "cond": false }),
    );
    assert_snapshot!(query, @"Query.name");
}

#[test]
fn different_arguments_do_not_merge() {
    let query =
        normalize("{ animal { ... on Dog { sound(volume: 1) } ... on Cat { sound(volume: 2) } } }");
    assert_snapshot!(query, @r###"
    Query.animal
      Dog.sound(volume: 1)
      Cat.sound(volume: 2)
    "###);

    let animal = query.top_level_fields()[0];
    assert_eq!(query.children_with_response_key(animal, "sound").count(), 2);
}

#[test]
fn merges_sub_selections_of_merged_fields() {
    let query = normalize(
        r#"
        {
          search(term: "x") { ... on Dog { name } }
          search(term: "x") { ... on Person { name } }
        }
        "#,
    );
    assert_snapshot!(query, @r###"
    Query.search(term: "x")
      [Dog, Person].name
    "###);
}

#[test]
fn different_fields_under_one_response_key() {
    let query = normalize(
        "{ animal { ... on Dog { noise: bark(loud: true) } ... on Cat { noise: meow } } }",
    );
    assert_snapshot!(query, @r###"
    Query.animal
      noise: Dog.bark(loud: true)
      noise: Cat.meow
    "###);
}

#[test]
fn groups_siblings_by_response_key() {
    let query = normalize(
        r#"
        {
          animal {
            ... on Dog { noise: bark name }
            ... on Cat { noise: meow }
          }
        }
        "#,
    );
    assert_snapshot!(query, @r###"
    Query.animal
      noise: Dog.bark
      noise: Cat.meow
      Dog.name
    "###);
}

#[test]
fn typename_on_union_members() {
    let query = normalize(
        r#"{ search(term: "x") { __typename ... on Dog { name } ... on Person { name } } }"#,
    );
    assert_snapshot!(query, @r###"
    Query.search(term: "x")
      [Dog, Person].__typename
      [Dog, Person].name
    "###);
}

#[test]
fn builds_nested_children() {
    let query = normalize("{ pets { owner { name pets { name } } } }");
    assert_snapshot!(query, @r###"
    Query.pets
      [Dog, Cat].owner
        Person.name
        Person.pets
          [Dog, Cat].name
    "###);

    let depths: Vec<(String, usize)> = query
        .iter()
        .map(|(_, field)| (field.to_string(), field.depth()))
        .collect();
    assert_eq!(
        depths,
        [
            ("Query.pets".to_owned(), 1),
            ("[Dog, Cat].owner".to_owned(), 2),
            ("Person.name".to_owned(), 3),
            ("Person.pets".to_owned(), 3),
            ("[Dog, Cat].name".to_owned(), 4),
        ]
    );

    let (schema, _) = parse_schema_and_operation("{ name }");
    let owner = find(&query, "owner");
    let definitions = query.field(owner).field_definitions(&schema).unwrap();
    assert_eq!(definitions.len(), 2);
    let definition = query.field(owner).one_field_definition(&schema).unwrap();
    assert_eq!(definition.ty.to_string(), "Person");
}

#[test]
fn fragment_spread_in_several_places() {
    let (schema, document) = parse_schema_and_operation(
        r#"
        query { dog(id: 1) { ...DogName } pets { ...DogName } }
        fragment DogName on Dog { name }
        "#,
    );
    let query = QueryNormalizer::new(schema, NormalizerConfig::default())
        .normalize(&document, None, &JsonMap::new())
        .unwrap();
    assert_snapshot!(query, @r###"
    Query.dog(id: 1)
      Dog.name
    Query.pets
      Dog.name
    "###);

    let fragment = document.fragments.get("DogName").unwrap();
    let name_field = first_field(&fragment.selection_set);
    let normalized = query.normalized_fields_for(name_field);
    assert_eq!(normalized.len(), 2);
    assert_ne!(query.parent(normalized[0]), query.parent(normalized[1]));

    assert_eq!(
        query.normalized_fields_at(&FieldCoordinates::new(name!("Dog"), name!("name"))),
        normalized
    );
}

#[test]
fn missing_fragment_definition_is_an_internal_error() {
    let (schema, document) =
        parse_schema_and_operation("{ animal { ...DogBark } } fragment DogBark on Dog { bark }");
    let operation = document.operations.get(None).unwrap();
    let error = QueryNormalizer::new(schema, NormalizerConfig::default())
        .normalize_operation(operation, &NamedFragments::default(), &JsonMap::new())
        .unwrap_err();
    assert!(error.is_internal());
    assert_eq!(
        error,
        NormalizationError::Internal {
            message: "Missing fragment named DogBark".to_owned()
        }
    );
}

#[test]
fn indexes_fields_by_ast_node_and_coordinates() {
    let (schema, document) =
        parse_schema_and_operation("{ animal { ... on Dog { sound } ... on Cat { sound } } }");
    let query = QueryNormalizer::new(schema, NormalizerConfig::default())
        .normalize(&document, None, &JsonMap::new())
        .unwrap();

    let operation = document.operations.get(None).unwrap();
    let animal = first_field(&operation.selection_set);
    assert_eq!(query.normalized_fields_for(animal), query.top_level_fields());

    let sound = find(&query, "sound");
    let merged: Vec<_> = query.merged_field(sound).fields().to_vec();
    for ast_field in &merged {
        assert_eq!(query.normalized_fields_for(ast_field), [sound]);
    }
    for type_name in [name!("Dog"), name!("Cat")] {
        let coordinates = FieldCoordinates::new(type_name, name!("sound"));
        assert_eq!(query.normalized_fields_at(&coordinates), [sound]);
    }
    assert!(
        query
            .normalized_fields_at(&FieldCoordinates::new(name!("Animal"), name!("sound")))
            .is_empty()
    );
    assert_eq!(
        query.normalized_fields_at(&FieldCoordinates::new(name!("Query"), name!("animal"))),
        query.top_level_fields()
    );
}

#[rstest]
#[case::include_dog(
    json!({ "withDog": true, "skipCat": true }),
    "Query.animal\n  Dog.bark\n  [Dog, Cat].name"
)]
#[case::exclude_dog(
    json!({ "withDog": false, "skipCat": false }),
    "Query.animal\n  Cat.meow\n  [Dog, Cat].name"
)]
fn skip_and_include_on_fragments(
    #[case] coerced_variables: serde_json_bytes::Value,
    #[case] expected: &str,
) {
    let query = normalize_with_variables(
        r#"
        query($withDog: Boolean!, $skipCat: Boolean!) {
          animal {
            ... on Dog @include(if: $withDog) { bark }
            ...CatFields @skip(if: $skipCat)
            ...AnimalName
          }
        }
        fragment CatFields on Cat { meow }
        fragment AnimalName on Animal { name }
        "#,
        coerced_variables,
    );
    assert_eq!(query.to_string(), expected);
}

#[test]
fn resolves_arguments_with_defaults() {
    let query = normalize_with_variables(
        "query($id: ID!) { dog(id: $id) { bark } }",
        json!({ "id": "7" }),
    );
    let dog = find(&query, "dog");
    let bark = find(&query, "bark");
    assert_eq!(
        serde_json_bytes::Value::Object(query.field(dog).resolved_arguments().clone()),
        json!({ "id": "7" })
    );
    assert_eq!(
        serde_json_bytes::Value::Object(query.field(bark).resolved_arguments().clone()),
        json!({ "loud": false })
    );
    assert!(query.field(bark).normalized_arguments().is_none());
}

#[test]
fn normalizes_arguments_from_raw_variables() {
    let (schema, document) =
        parse_schema_and_operation("query($id: ID!) { dog(id: $id) { bark } }");
    let query = QueryNormalizer::new(schema, NormalizerConfig::default())
        .normalize_with_raw_variables(&document, None, &variables(json!({ "id": 5 })))
        .unwrap();

    let dog = query.field(find(&query, "dog"));
    assert_eq!(
        serde_json_bytes::Value::Object(dog.resolved_arguments().clone()),
        json!({ "id": 5 })
    );
    let arguments = dog.normalized_arguments().unwrap();
    assert_eq!(arguments[&name!("id")].type_name, "ID!");
    assert_eq!(
        arguments[&name!("id")].value,
        NormalizedValue::Variable {
            name: name!("id"),
            value: Box::new(NormalizedValue::Input(json!(5))),
        }
    );

    let bark = query.field(find(&query, "bark"));
    let arguments = bark.normalized_arguments().unwrap();
    assert_eq!(arguments[&name!("loud")].type_name, "Boolean");
    assert_eq!(arguments[&name!("loud")].value.to_string(), "false (default)");
}

#[test]
fn normalized_arguments_can_be_disabled() {
    let (schema, document) =
        parse_schema_and_operation("query($id: ID!) { dog(id: $id) { bark } }");
    let config = NormalizerConfig {
        normalized_arguments: false,
        ..Default::default()
    };
    let query = QueryNormalizer::new(schema, config)
        .normalize_with_raw_variables(&document, None, &variables(json!({ "id": 5 })))
        .unwrap();
    assert!(query.iter().all(|(_, field)| field.normalized_arguments().is_none()));
}

#[test]
fn invalid_raw_variables_abort_normalization() {
    let (schema, document) =
        parse_schema_and_operation("query($id: ID!) { dog(id: $id) { bark } }");
    let normalizer = QueryNormalizer::new(schema, NormalizerConfig::default());
    let missing = normalizer.normalize_with_raw_variables(&document, None, &JsonMap::new());
    assert_eq!(
        missing.unwrap_err(),
        NormalizationError::VariableCoercion {
            message: "missing value for non-null variable 'id'".to_owned()
        }
    );
    let wrong_type =
        normalizer.normalize_with_raw_variables(&document, None, &variables(json!({ "id": 1.5 })));
    assert!(matches!(
        wrong_type,
        Err(NormalizationError::VariableCoercion { .. })
    ));
}

#[test]
fn missing_required_argument_value_is_an_error() {
    let result = normalize_with_config(
        "query($id: ID!) { dog(id: $id) { bark } }",
        json!({}),
        NormalizerConfig::default(),
    );
    assert!(matches!(
        result,
        Err(NormalizationError::ArgumentCoercion { .. })
    ));
}

#[test]
fn selects_operation_by_name() {
    let (schema, document) = parse_schema_and_operation(
        r#"
        query A { name }
        query B { animal { name } }
        "#,
    );
    let normalizer = QueryNormalizer::new(schema, NormalizerConfig::default());
    let query = normalizer
        .normalize(&document, Some("B"), &JsonMap::new())
        .unwrap();
    assert_snapshot!(query, @r###"
    Query.animal
      [Dog, Cat].name
    "###);

    assert_eq!(
        normalizer
            .normalize(&document, Some("C"), &JsonMap::new())
            .unwrap_err(),
        NormalizationError::UnknownOperation {
            name: Some("C".to_owned())
        }
    );
    assert!(matches!(
        normalizer.normalize(&document, None, &JsonMap::new()),
        Err(NormalizationError::UnknownOperation { name: None })
    ));
}

#[test]
fn normalization_is_deterministic() {
    let query = r#"
        query($id: ID!) {
          dog(id: $id) { ... on Pet { owner { name } } sound name }
          animal { ... on Cat { meow sound(volume: 3) } ... on Dog { sound(volume: 3) } }
          pets { ... on Animal { name } name }
        }
    "#;
    let first = normalize_with_variables(query, json!({ "id": "1" }));
    let second = normalize_with_variables(query, json!({ "id": "1" }));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_snapshot!(first, @r###"
    Query.dog(id: $id)
      Dog.owner
        Person.name
      Dog.sound
      Dog.name
    Query.animal
      Cat.meow
      [Cat, Dog].sound(volume: 3)
    Query.pets
      [Dog, Cat].name
    "###);
}

#[test]
fn serializes_fields_and_coordinates() {
    let query = normalize("{ a: name }");
    let json = serde_json::to_value(&query).unwrap();
    assert_eq!(json["fields"][0]["alias"], "a");
    assert_eq!(json["fields"][0]["field_name"], "name");
    assert_eq!(json["fields"][0]["field_type"], "String");
    assert_eq!(json["fields"][0]["object_type_names"][0], "Query");
    assert_eq!(json["coordinates_to_normalized"]["Query.name"][0], 0);
    assert_eq!(json["top_level_fields"][0], 0);
}

#[test]
#[traced_test]
fn recursion_limit_is_enforced() {
    let query = "{ pets { owner { name } } }";
    let limited = NormalizerConfig {
        recursion_limit: Some(2),
        ..Default::default()
    };
    assert_eq!(
        normalize_with_config(query, json!({}), limited).unwrap_err(),
        NormalizationError::RecursionLimitExceeded { limit: 2 }
    );
    assert!(logs_contain("recursion limit(2) exceeded"));

    let enough = NormalizerConfig {
        recursion_limit: Some(3),
        ..Default::default()
    };
    assert_eq!(normalize_with_config(query, json!({}), enough).unwrap().len(), 3);
}

#[test]
#[traced_test]
fn logs_normalization_summary() {
    normalize("{ pets { name } }");
    assert!(logs_contain("normalized operation"));
    assert!(logs_contain("normalized_fields=2"));
}
