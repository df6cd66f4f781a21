//! Building an entity from request data at dispatch time.
//!
//! A handler's parameter types are known when it is registered with the
//! dispatcher, so they travel in the [`DispatchContext`] as a list of
//! [`Parameter`]s. Entity types that can be built from request data implement
//! [`Inject`] and are registered with a [`Binder`]. On dispatch the binder
//! walks the parameters in order, builds the first registered type it meets
//! from the request payload and publishes it under [`INJECTED_ENTITY_KEY`].
//! At most one entity is injected per dispatch.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

use crate::database::Database;
use crate::datatype::{Row, Value};
use crate::entity::{Entity, Record};

/// Key under which the injected entity is published in the request context.
pub const INJECTED_ENTITY_KEY: &str = "entity";

/// Untyped request data, as decoded from the request body or query.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Entities that can be built straight from request data.
pub trait Inject: Entity {
    /// Builds an instance from `payload` without reading storage. It counts
    /// as existing only when the payload carries a positive key, and it stays
    /// dirty so that a later `store` writes the submitted values.
    fn inject(payload: &Payload, db: &Database) -> Self {
        let row: Row = payload
            .iter()
            .map(|(column, value)| (column.clone(), Value::from(value.clone())))
            .collect();
        Self::from_record(Record::from_request(Self::meta(), db.clone(), row))
    }
}

// ------------- Parameters -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    type_id: Option<TypeId>,
    type_name: Option<&'static str>,
}

impl Parameter {
    pub fn of<T: 'static>(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            type_id: Some(TypeId::of::<T>()),
            type_name: Some(type_name::<T>()),
        }
    }
    /// A parameter whose concrete type is not known.
    pub fn unresolved(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            type_id: None,
            type_name: None,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }
}

// ------------- Dispatch context -------------
/// What the dispatcher knows about one inbound operation.
pub struct DispatchContext {
    parameters: Vec<Parameter>,
    payload: Payload,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl DispatchContext {
    pub fn new(parameters: Vec<Parameter>, payload: Payload) -> Self {
        Self {
            parameters,
            payload,
            attributes: HashMap::new(),
        }
    }
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
    pub fn publish(&mut self, key: &str, value: Box<dyn Any + Send + Sync>) {
        self.attributes.insert(key.to_owned(), value);
    }
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }
    pub fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key).and_then(|v| v.downcast_ref::<T>())
    }
    /// Removes and returns the attribute if it has type `T`.
    pub fn take_attribute<T: Any>(&mut self, key: &str) -> Option<T> {
        if self.attribute::<T>(key).is_none() {
            return None;
        }
        self.attributes
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }
    /// The injected entity, if it is an `E`.
    pub fn injected<E: Entity>(&self) -> Option<&E> {
        self.attribute::<E>(INJECTED_ENTITY_KEY)
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("parameters", &self.parameters)
            .field("payload", &self.payload)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ------------- Binder -------------
type Factory = fn(&Payload, &Database) -> Box<dyn Any + Send + Sync>;

fn build<E: Inject>(payload: &Payload, db: &Database) -> Box<dyn Any + Send + Sync> {
    Box::new(E::inject(payload, db))
}

struct Injector {
    type_name: &'static str,
    factory: Factory,
}

/// Registry of the entity types that may be injected.
#[derive(Default)]
pub struct Binder {
    injectors: HashMap<TypeId, Injector>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register<E: Inject>(&mut self) -> &mut Self {
        self.injectors.insert(
            TypeId::of::<E>(),
            Injector {
                type_name: type_name::<E>(),
                factory: build::<E>,
            },
        );
        self
    }
    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.injectors.contains_key(&type_id)
    }
    /// Injects an entity for the first qualifying parameter of `context`.
    ///
    /// Returns whether something was injected. When nothing qualifies the
    /// context is left as it was.
    pub fn bind(&self, context: &mut DispatchContext, db: &Database) -> bool {
        let found = context.parameters().iter().find_map(|parameter| {
            let Some(type_id) = parameter.type_id() else {
                trace!(parameter = parameter.name(), "skipping parameter without a type");
                return None;
            };
            let injector = self.injectors.get(&type_id)?;
            Some((parameter.name().to_owned(), injector))
        });
        let Some((parameter, injector)) = found else {
            trace!("no injectable parameter");
            return false;
        };
        let entity = (injector.factory)(context.payload(), db);
        context.publish(INJECTED_ENTITY_KEY, entity);
        debug!(parameter = %parameter, entity = injector.type_name, "injected entity");
        true
    }
}
