//! Collection validators.
//!
//! A [`SchemaNode`] models the subset of MongoDB's `$jsonSchema` keywords used by the
//! application: `bsonType`, `required`, `properties`, `minimum`, `pattern`, `enum` and
//! `items`. The same tree renders to the server-side validator and evaluates documents
//! locally, so the in-memory store and dry runs reject exactly what the server would.

use std::collections::BTreeMap;
use std::fmt;

use bson::{doc, Bson, Document};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// BSON type aliases accepted by `bsonType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    /// Embedded document.
    Object,
    /// Array.
    Array,
    /// UTF-8 string.
    String,
    /// UTC datetime.
    Date,
    /// `ObjectId`.
    ObjectId,
    /// Boolean.
    Bool,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// 64-bit float.
    Double,
    /// 128-bit decimal.
    Decimal,
    /// Any numeric type.
    Number,
}

impl BsonType {
    /// The alias as written in a validator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Date => "date",
            Self::ObjectId => "objectId",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Long => "long",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Number => "number",
        }
    }

    /// Whether `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Bson) -> bool {
        match self {
            Self::Object => matches!(value, Bson::Document(_)),
            Self::Array => matches!(value, Bson::Array(_)),
            Self::String => matches!(value, Bson::String(_)),
            Self::Date => matches!(value, Bson::DateTime(_)),
            Self::ObjectId => matches!(value, Bson::ObjectId(_)),
            Self::Bool => matches!(value, Bson::Boolean(_)),
            Self::Int => matches!(value, Bson::Int32(_)),
            Self::Long => matches!(value, Bson::Int64(_)),
            Self::Double => matches!(value, Bson::Double(_)),
            Self::Decimal => matches!(value, Bson::Decimal128(_)),
            Self::Number => matches!(
                value,
                Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)
            ),
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document rejected by a validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("document failed validation at {path}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending value, `(root)` for the document itself.
    pub path: String,
    /// What rule was violated.
    pub reason: String,
}

impl ValidationError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() {
                "(root)".to_string()
            } else {
                path.to_string()
            },
            reason: reason.into(),
        }
    }
}

/// One node of a `$jsonSchema` tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SchemaNode {
    /// Required BSON type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bson_type: Option<BsonType>,

    /// Fields that must be present (objects only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Per-field rules (objects only). Unlisted fields are allowed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,

    /// Inclusive lower bound (numbers only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    /// Regular expression the value must match (strings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Closed set of allowed string values.
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,

    /// Rule applied to every element (arrays only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Free-form note carried into the server validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaNode {
    /// A node constrained to `bson_type`.
    #[must_use]
    pub fn of(bson_type: BsonType) -> Self {
        Self {
            bson_type: Some(bson_type),
            ..Self::default()
        }
    }

    /// An object node.
    #[must_use]
    pub fn object() -> Self {
        Self::of(BsonType::Object)
    }

    /// Add required fields.
    #[must_use]
    pub fn require<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Add a field rule.
    #[must_use]
    pub fn property(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.properties.insert(name.into(), node);
        self
    }

    /// Set the inclusive minimum.
    #[must_use]
    pub fn with_minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// Set the pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Restrict to a closed set of values.
    #[must_use]
    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(Into::into).collect();
        self
    }

    /// Set the element rule.
    #[must_use]
    pub fn with_items(mut self, items: SchemaNode) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    /// Attach a description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Render this node in `$jsonSchema` syntax.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        if let Some(bson_type) = self.bson_type {
            document.insert("bsonType", bson_type.as_str());
        }
        if !self.required.is_empty() {
            document.insert("required", self.required.clone());
        }
        if !self.properties.is_empty() {
            let properties: Document = self
                .properties
                .iter()
                .map(|(name, node)| (name.clone(), Bson::Document(node.to_document())))
                .collect();
            document.insert("properties", properties);
        }
        if let Some(minimum) = self.minimum {
            document.insert("minimum", minimum);
        }
        if let Some(ref pattern) = self.pattern {
            document.insert("pattern", pattern.as_str());
        }
        if !self.allowed.is_empty() {
            document.insert("enum", self.allowed.clone());
        }
        if let Some(ref items) = self.items {
            document.insert("items", items.to_document());
        }
        if let Some(ref description) = self.description {
            document.insert("description", description.as_str());
        }
        document
    }

    /// Evaluate a value against this node.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule, depth first.
    pub fn validate(&self, value: &Bson) -> std::result::Result<(), ValidationError> {
        self.check(value, "")
    }

    fn check(&self, value: &Bson, path: &str) -> std::result::Result<(), ValidationError> {
        if let Some(expected) = self.bson_type {
            if !expected.matches(value) {
                return Err(ValidationError::new(
                    path,
                    format!("expected {expected}, found {}", type_name(value)),
                ));
            }
        }

        if let (Some(minimum), Some(number)) = (self.minimum, numeric_value(value)) {
            if number < minimum {
                return Err(ValidationError::new(
                    path,
                    format!("{number} is less than the minimum of {minimum}"),
                ));
            }
        }

        if let (Some(pattern), Bson::String(text)) = (&self.pattern, value) {
            let regex = Regex::new(pattern)
                .map_err(|e| ValidationError::new(path, format!("unusable pattern: {e}")))?;
            if !regex.is_match(text) {
                return Err(ValidationError::new(
                    path,
                    format!("{text:?} does not match {pattern}"),
                ));
            }
        }

        if !self.allowed.is_empty() {
            let permitted = matches!(value, Bson::String(s) if self.allowed.contains(s));
            if !permitted {
                return Err(ValidationError::new(
                    path,
                    format!("{value} is not one of [{}]", self.allowed.join(", ")),
                ));
            }
        }

        match value {
            Bson::Document(fields) => self.check_fields(fields, path),
            Bson::Array(elements) => {
                if let Some(ref items) = self.items {
                    for (i, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{path}[{i}]"))?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_fields(&self, fields: &Document, path: &str) -> std::result::Result<(), ValidationError> {
        for name in &self.required {
            if !fields.contains_key(name) {
                return Err(ValidationError::new(
                    &join(path, name),
                    "required field is missing",
                ));
            }
        }
        for (name, node) in &self.properties {
            if let Some(value) = fields.get(name) {
                node.check(value, &join(path, name))?;
            }
        }
        Ok(())
    }

    fn patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(ref pattern) = self.pattern {
            out.push(pattern);
        }
        for node in self.properties.values() {
            node.patterns(out);
        }
        if let Some(ref items) = self.items {
            items.patterns(out);
        }
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// The value of any numeric BSON type as `f64`, `None` for non-numbers.
///
/// `long` values beyond 2^53 and `decimal` values lose precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn numeric_value(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        Bson::Decimal128(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::String(_) => "string",
        Bson::DateTime(_) => "date",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::Int32(_) => "int",
        Bson::Int64(_) => "long",
        Bson::Double(_) => "double",
        Bson::Decimal128(_) => "decimal",
        Bson::Null => "null",
        _ => "other",
    }
}

/// A named collection and its validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Root validator node.
    pub validator: SchemaNode,
}

impl CollectionSchema {
    /// Create a schema.
    #[must_use]
    pub fn new(name: impl Into<String>, validator: SchemaNode) -> Self {
        Self {
            name: name.into(),
            validator,
        }
    }

    /// The `validator` option for `create`, i.e. `{ $jsonSchema: ... }`.
    #[must_use]
    pub fn validator_document(&self) -> Document {
        doc! { "$jsonSchema": self.validator.to_document() }
    }

    /// Evaluate a document the way the server would on insert.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(&self, document: &Document) -> std::result::Result<(), ValidationError> {
        if let Some(expected) = self.validator.bson_type {
            if expected != BsonType::Object {
                return Err(ValidationError::new(
                    "",
                    format!("expected {expected}, found object"),
                ));
            }
        }
        self.validator.check_fields(document, "")
    }

    /// Check that the schema itself is usable.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSchema` for an empty or `$`-prefixed name, a
    /// non-object root, or a pattern that does not compile.
    pub fn check_definition(&self) -> Result<()> {
        let invalid = |message: String| CoreError::InvalidSchema {
            collection: self.name.clone(),
            message,
        };

        if self.name.is_empty() || self.name.starts_with('$') || self.name.contains('\0') {
            return Err(invalid("collection name is not valid".into()));
        }
        if matches!(self.validator.bson_type, Some(t) if t != BsonType::Object) {
            return Err(invalid("root node must be an object".into()));
        }

        let mut patterns = Vec::new();
        self.validator.patterns(&mut patterns);
        for pattern in patterns {
            Regex::new(pattern).map_err(|e| invalid(format!("pattern {pattern:?}: {e}")))?;
        }
        Ok(())
    }
}

/// Pattern accepted for `users.email`.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Order states accepted by `orders.status`.
pub const ORDER_STATUSES: [&str; 5] = ["pending", "confirmed", "shipped", "delivered", "cancelled"];

/// The `users`, `products` and `orders` schemas.
#[must_use]
pub fn default_schemas() -> Vec<CollectionSchema> {
    vec![users_schema(), products_schema(), orders_schema()]
}

fn users_schema() -> CollectionSchema {
    let validator = SchemaNode::object()
        .require(["username", "email", "createdAt"])
        .property(
            "username",
            SchemaNode::of(BsonType::String).describe("username is required and must be a string"),
        )
        .property(
            "email",
            SchemaNode::of(BsonType::String)
                .with_pattern(EMAIL_PATTERN)
                .describe("email must be a valid address"),
        )
        .property(
            "fullName",
            SchemaNode::of(BsonType::String).describe("full display name"),
        )
        .property(
            "createdAt",
            SchemaNode::of(BsonType::Date).describe("creation time is required"),
        )
        .property(
            "updatedAt",
            SchemaNode::of(BsonType::Date).describe("last update time"),
        );
    CollectionSchema::new("users", validator)
}

fn products_schema() -> CollectionSchema {
    let validator = SchemaNode::object()
        .require(["name", "price", "category", "createdAt"])
        .property(
            "name",
            SchemaNode::of(BsonType::String).describe("product name is required"),
        )
        .property(
            "price",
            SchemaNode::of(BsonType::Number)
                .with_minimum(0.0)
                .describe("price must not be negative"),
        )
        .property(
            "category",
            SchemaNode::of(BsonType::String).describe("product category"),
        )
        .property(
            "description",
            SchemaNode::of(BsonType::String).describe("product description"),
        )
        .property(
            "stock",
            SchemaNode::of(BsonType::Int)
                .with_minimum(0.0)
                .describe("units in stock"),
        )
        .property(
            "createdAt",
            SchemaNode::of(BsonType::Date).describe("creation time"),
        );
    CollectionSchema::new("products", validator)
}

fn orders_schema() -> CollectionSchema {
    let line_item = SchemaNode::object()
        .require(["productId", "quantity", "price"])
        .property("productId", SchemaNode::of(BsonType::ObjectId))
        .property("quantity", SchemaNode::of(BsonType::Int).with_minimum(1.0))
        .property("price", SchemaNode::of(BsonType::Number).with_minimum(0.0));

    let validator = SchemaNode::object()
        .require(["userId", "products", "totalAmount", "status", "createdAt"])
        .property(
            "userId",
            SchemaNode::of(BsonType::ObjectId).describe("ordering user"),
        )
        .property(
            "products",
            SchemaNode::of(BsonType::Array).with_items(line_item),
        )
        .property(
            "totalAmount",
            SchemaNode::of(BsonType::Number).with_minimum(0.0),
        )
        .property(
            "status",
            SchemaNode::of(BsonType::String).with_enum(ORDER_STATUSES),
        )
        .property("createdAt", SchemaNode::of(BsonType::Date));
    CollectionSchema::new("orders", validator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::DateTime;

    fn schema(name: &str) -> CollectionSchema {
        default_schemas()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    fn product(price: f64, stock: i32) -> Document {
        doc! {
            "name": "Laptop Gaming",
            "price": price,
            "category": "Electronics",
            "stock": stock,
            "createdAt": DateTime::now(),
        }
    }

    fn order(status: &str, quantity: i32) -> Document {
        doc! {
            "userId": ObjectId::new(),
            "products": [
                { "productId": ObjectId::new(), "quantity": quantity, "price": 199_000 },
            ],
            "totalAmount": 199_000,
            "status": status,
            "createdAt": DateTime::now(),
        }
    }

    #[test]
    fn valid_user_passes() {
        let user = doc! {
            "username": "john_doe",
            "email": "john@example.com",
            "fullName": "John Doe",
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };
        schema("users").validate(&user).unwrap();
    }

    #[test]
    fn user_missing_created_at_fails() {
        let user = doc! { "username": "john_doe", "email": "john@example.com" };
        let err = schema("users").validate(&user).unwrap_err();
        assert_eq!(err.path, "createdAt");
    }

    #[test]
    fn malformed_email_fails() {
        for email in ["john", "john@example", "john@example.c", "@example.com"] {
            let user = doc! {
                "username": "john_doe",
                "email": email,
                "createdAt": DateTime::now(),
            };
            let err = schema("users").validate(&user).unwrap_err();
            assert_eq!(err.path, "email", "{email} should be rejected");
        }
    }

    #[test]
    fn negative_price_fails() {
        let err = schema("products").validate(&product(-1.0, 10)).unwrap_err();
        assert_eq!(err.path, "price");
    }

    #[test]
    fn negative_stock_fails() {
        let err = schema("products").validate(&product(10.0, -1)).unwrap_err();
        assert_eq!(err.path, "stock");
    }

    #[test]
    fn negative_decimal_price_fails() {
        let mut document = product(10.0, 10);
        let price: bson::Decimal128 = "-1".parse().unwrap();
        document.insert("price", price);

        let err = schema("products").validate(&document).unwrap_err();
        assert_eq!(err.path, "price");
    }

    #[test]
    fn numeric_value_covers_every_number_type() {
        let decimal: bson::Decimal128 = "2.5".parse().unwrap();
        assert_eq!(numeric_value(&Bson::Int32(3)), Some(3.0));
        assert_eq!(numeric_value(&Bson::Int64(-4)), Some(-4.0));
        assert_eq!(numeric_value(&Bson::Double(1.5)), Some(1.5));
        assert_eq!(numeric_value(&Bson::Decimal128(decimal)), Some(2.5));
        assert_eq!(numeric_value(&Bson::String("1".into())), None);
    }

    #[test]
    fn email_requires_literal_dot_before_tld() {
        // "." in the pattern is escaped, so any other character before the TLD fails.
        let user = doc! {
            "username": "john_doe",
            "email": "john@examplexcom",
            "createdAt": DateTime::now(),
        };
        let err = schema("users").validate(&user).unwrap_err();
        assert_eq!(err.path, "email");
    }

    #[test]
    fn zero_price_and_stock_pass() {
        schema("products").validate(&product(0.0, 0)).unwrap();
    }

    #[test]
    fn fractional_stock_fails_int_type() {
        let mut doc = product(10.0, 1);
        doc.insert("stock", 1.5);
        let err = schema("products").validate(&doc).unwrap_err();
        assert!(err.reason.contains("expected int"));
    }

    #[test]
    fn unknown_order_status_fails() {
        let err = schema("orders").validate(&order("unknown", 1)).unwrap_err();
        assert_eq!(err.path, "status");
    }

    #[test]
    fn every_order_status_passes() {
        for status in ORDER_STATUSES {
            schema("orders").validate(&order(status, 1)).unwrap();
        }
    }

    #[test]
    fn line_item_quantity_checked() {
        let err = schema("orders").validate(&order("pending", 0)).unwrap_err();
        assert_eq!(err.path, "products[0].quantity");
    }

    #[test]
    fn validator_document_shape() {
        let validator = schema("orders").validator_document();
        let root = validator.get_document("$jsonSchema").unwrap();
        assert_eq!(root.get_str("bsonType").unwrap(), "object");
        assert_eq!(root.get_array("required").unwrap().len(), 5);

        let properties = root.get_document("properties").unwrap();
        let status = properties.get_document("status").unwrap();
        assert_eq!(status.get_array("enum").unwrap().len(), 5);

        let products = properties.get_document("products").unwrap();
        let items = products.get_document("items").unwrap();
        let quantity = items
            .get_document("properties")
            .unwrap()
            .get_document("quantity")
            .unwrap();
        assert_eq!(quantity.get_str("bsonType").unwrap(), "int");
        assert_eq!(quantity.get_f64("minimum").unwrap(), 1.0);
    }

    #[test]
    fn parses_json_schema_keywords() {
        let node: SchemaNode = serde_json::from_str(
            r#"{
                "bsonType": "object",
                "required": ["sku"],
                "properties": {
                    "sku": { "bsonType": "string", "pattern": "^[A-Z]{3}-\\d+$" },
                    "owner": { "bsonType": "objectId" },
                    "state": { "enum": ["new", "old"] }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(node.properties["owner"].bson_type, Some(BsonType::ObjectId));
        assert_eq!(node.properties["state"].allowed, vec!["new", "old"]);

        let collection = CollectionSchema::new("inventory", node);
        collection.check_definition().unwrap();
        collection.validate(&doc! { "sku": "ABC-12" }).unwrap();
        assert!(collection.validate(&doc! { "sku": "abc" }).is_err());
        assert!(collection
            .validate(&doc! { "sku": "ABC-1", "state": "broken" })
            .is_err());
    }

    #[test]
    fn unknown_keyword_rejected() {
        let parsed = serde_json::from_str::<SchemaNode>(r#"{"maxLength": 3}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn bad_pattern_rejected_by_definition_check() {
        let collection = CollectionSchema::new(
            "broken",
            SchemaNode::object().property("x", SchemaNode::of(BsonType::String).with_pattern("(")),
        );
        assert!(matches!(
            collection.check_definition(),
            Err(CoreError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn default_schemas_are_well_formed() {
        let schemas = default_schemas();
        let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["users", "products", "orders"]);
        for schema in &schemas {
            schema.check_definition().unwrap();
        }
    }
}
