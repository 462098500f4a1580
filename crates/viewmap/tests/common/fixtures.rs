use indexmap::IndexMap;
use viewmap::model::with_entity;
use viewmap::{
    entity, factory, impl_entity, EntityRef, IdentityKey, ModelType, ModelValue, Node,
    NodeBuilder, Property, Template, ViewError,
};

pub fn person_type() -> ModelType {
    ModelType::new("zoo::Person")
}

pub fn pet_type() -> ModelType {
    ModelType::new("zoo::Pet")
}

pub fn animal_type() -> ModelType {
    ModelType::new("zoo::Animal")
}

pub fn dog_type() -> ModelType {
    ModelType::extending("zoo::Dog", &animal_type())
}

pub fn cat_type() -> ModelType {
    ModelType::extending("zoo::Cat", &animal_type())
}

pub fn vet_type() -> ModelType {
    ModelType::new("zoo::Vet")
}

#[derive(Default)]
pub struct Person {
    pub name: String,
    pub age: Option<i64>,
    pub tags: Vec<String>,
    pub scores: IndexMap<String, i64>,
    pub pets: Vec<EntityRef>,
    pub best: Option<EntityRef>,
    pub friends: IndexMap<String, EntityRef>,
    pub animals: Vec<EntityRef>,
    pub vet: Option<EntityRef>,
}
impl_entity!(Person, person_type());

#[derive(Debug, Default)]
pub struct Pet {
    pub name: String,
    pub age: i64,
}
impl_entity!(Pet, pet_type());

#[derive(Debug, Default)]
pub struct Dog {
    pub name: String,
    pub barks: bool,
}
impl_entity!(Dog, dog_type());

#[derive(Debug, Default)]
pub struct Cat {
    pub name: String,
    pub lives: i64,
}
impl_entity!(Cat, cat_type());

#[derive(Debug, Default)]
pub struct Vet {
    pub id: i64,
}
impl_entity!(Vet, vet_type());

pub fn pet(name: &str) -> EntityRef {
    entity(Pet {
        name: name.to_string(),
        age: 0,
    })
}

pub fn person(name: &str, pets: &[&str]) -> EntityRef {
    entity(Person {
        name: name.to_string(),
        pets: pets.iter().map(|n| pet(n)).collect(),
        ..Person::default()
    })
}

pub fn pet_names(person: &EntityRef) -> Vec<String> {
    let pets = with_entity::<Person, _>(person, |p| p.pets.clone()).unwrap();
    pets.iter()
        .map(|e| with_entity::<Pet, _>(e, |p| p.name.clone()).unwrap())
        .collect()
}

// -------------------------------------------------------------------------
// Value conversion

pub fn text(v: ModelValue) -> viewmap::Result<String> {
    match v {
        ModelValue::Null => Ok(String::new()),
        ModelValue::Str(s) => Ok(s),
        other => Err(ViewError::access(format!("expected text, found {}", other.kind()))),
    }
}

pub fn int(v: ModelValue) -> viewmap::Result<Option<i64>> {
    match v {
        ModelValue::Null => Ok(None),
        ModelValue::Int(i) => Ok(Some(i)),
        other => Err(ViewError::access(format!("expected int, found {}", other.kind()))),
    }
}

// -------------------------------------------------------------------------
// Properties

pub fn person_name() -> Property {
    Property::new(
        "name",
        |p: &Person| ModelValue::from(p.name.clone()),
        |p: &mut Person, v: ModelValue| {
            p.name = text(v)?;
            Ok(())
        },
    )
}

pub fn person_age() -> Property {
    Property::new(
        "age",
        |p: &Person| ModelValue::from(p.age),
        |p: &mut Person, v: ModelValue| {
            p.age = int(v)?;
            Ok(())
        },
    )
}

pub fn person_tags() -> Property {
    Property::new(
        "tags",
        |p: &Person| ModelValue::from(p.tags.clone()),
        |p: &mut Person, v: ModelValue| {
            p.tags = match v {
                ModelValue::Null => Vec::new(),
                ModelValue::List(items) => items.into_iter().map(text).collect::<viewmap::Result<_>>()?,
                other => return Err(ViewError::access(format!("expected list, found {}", other.kind()))),
            };
            Ok(())
        },
    )
}

pub fn person_scores() -> Property {
    Property::new(
        "scores",
        |p: &Person| {
            ModelValue::Map(
                p.scores
                    .iter()
                    .map(|(k, v)| (k.clone(), ModelValue::Int(*v)))
                    .collect(),
            )
        },
        |p: &mut Person, v: ModelValue| {
            p.scores = match v {
                ModelValue::Null => IndexMap::new(),
                ModelValue::Map(entries) => entries
                    .into_iter()
                    .map(|(k, v)| -> viewmap::Result<(String, i64)> {
                        Ok((k, int(v)?.unwrap_or_default()))
                    })
                    .collect::<viewmap::Result<_>>()?,
                other => return Err(ViewError::access(format!("expected map, found {}", other.kind()))),
            };
            Ok(())
        },
    )
}

pub fn person_pets() -> Property {
    Property::new(
        "pets",
        |p: &Person| ModelValue::entities(p.pets.clone()),
        |p: &mut Person, v: ModelValue| {
            p.pets = v.into_entities()?;
            Ok(())
        },
    )
}

pub fn person_best() -> Property {
    Property::new(
        "best",
        |p: &Person| ModelValue::from(p.best.clone()),
        |p: &mut Person, v: ModelValue| {
            p.best = v.into_optional_entity()?;
            Ok(())
        },
    )
}

pub fn person_friends() -> Property {
    Property::new(
        "friends",
        |p: &Person| ModelValue::entity_map(p.friends.clone()),
        |p: &mut Person, v: ModelValue| {
            p.friends = v.into_entity_map()?;
            Ok(())
        },
    )
}

pub fn person_animals() -> Property {
    Property::new(
        "animals",
        |p: &Person| ModelValue::entities(p.animals.clone()),
        |p: &mut Person, v: ModelValue| {
            p.animals = v.into_entities()?;
            Ok(())
        },
    )
}

pub fn person_vet() -> Property {
    Property::new(
        "vet",
        |p: &Person| ModelValue::from(p.vet.clone()),
        |p: &mut Person, v: ModelValue| {
            p.vet = v.into_optional_entity()?;
            Ok(())
        },
    )
}

pub fn pet_name() -> Property {
    Property::new(
        "name",
        |p: &Pet| ModelValue::from(p.name.clone()),
        |p: &mut Pet, v: ModelValue| {
            p.name = text(v)?;
            Ok(())
        },
    )
}

pub fn pet_age() -> Property {
    Property::new(
        "age",
        |p: &Pet| ModelValue::Int(p.age),
        |p: &mut Pet, v: ModelValue| {
            p.age = int(v)?.unwrap_or_default();
            Ok(())
        },
    )
}

pub fn pet_key() -> IdentityKey {
    IdentityKey::new("name", |p: &Pet| ModelValue::from(p.name.clone()))
}

pub fn dog_name() -> Property {
    Property::new(
        "name",
        |d: &Dog| ModelValue::from(d.name.clone()),
        |d: &mut Dog, v: ModelValue| {
            d.name = text(v)?;
            Ok(())
        },
    )
}

pub fn dog_barks() -> Property {
    Property::new(
        "barks",
        |d: &Dog| ModelValue::Bool(d.barks),
        |d: &mut Dog, v: ModelValue| {
            d.barks = v.as_bool().unwrap_or_default();
            Ok(())
        },
    )
}

pub fn cat_name() -> Property {
    Property::new(
        "name",
        |c: &Cat| ModelValue::from(c.name.clone()),
        |c: &mut Cat, v: ModelValue| {
            c.name = text(v)?;
            Ok(())
        },
    )
}

pub fn cat_lives() -> Property {
    Property::new(
        "lives",
        |c: &Cat| ModelValue::Int(c.lives),
        |c: &mut Cat, v: ModelValue| {
            c.lives = int(v)?.unwrap_or_default();
            Ok(())
        },
    )
}

pub fn vet_id() -> Property {
    Property::read_only("id", |v: &Vet| ModelValue::Int(v.id))
}

// -------------------------------------------------------------------------
// Templates

/// `pets` array of named pets, keyed by name.
pub fn pets_node() -> Node {
    let b = NodeBuilder::new();
    b.array(person_pets(), pet_type())
        .factory(factory(Pet::default))
        .identity(pet_key())
        .child(b.value(pet_name()))
        .child(b.value(pet_age()))
}

/// Root pet object, e.g. for splicing.
pub fn pet_root() -> Node {
    let b = NodeBuilder::new();
    b.object(pet_type())
        .factory(factory(Pet::default))
        .child(b.value(pet_name()))
}

/// `Person { name, pets: [Pet { name }] }`.
pub fn person_template() -> Template {
    let b = NodeBuilder::new();
    Template::new(
        b.object(person_type())
            .factory(factory(Person::default))
            .child(b.value(person_name()))
            .child(
                b.array(person_pets(), pet_type())
                    .factory(factory(Pet::default))
                    .identity(pet_key())
                    .child(b.value(pet_name())),
            ),
    )
    .unwrap()
}

/// Polymorphic `animals` array with a branch per concrete animal.
pub fn animals_node() -> Node {
    let b = NodeBuilder::new();
    b.array(person_animals(), animal_type())
        .child(
            b.subtype(dog_type())
                .factory(factory(Dog::default))
                .child(b.value(dog_name()))
                .child(b.value(dog_barks())),
        )
        .child(
            b.subtype(cat_type())
                .factory(factory(Cat::default))
                .child(b.value(cat_name()))
                .child(b.value(cat_lives())),
        )
}
