use thiserror::Error;

use crate::cache::ResourceKey;

const PRODUCT_GID_PREFIX: &str = "gid://shopify/Product/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid product id {0:?}: expected digits or gid://shopify/Product/<digits>")]
    InvalidProductId(String),
    #[error("invalid product handle {0:?}: only letters, digits, '-' and '_' are allowed")]
    InvalidHandle(String),
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

// Numeric product id, stored without the gid prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductId(String);

impl ProductId {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let digits = raw.strip_prefix(PRODUCT_GID_PREFIX).unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(QueryError::InvalidProductId(raw.to_string()));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn gid(&self) -> String {
        format!("{PRODUCT_GID_PREFIX}{}", self.0)
    }
}

// Human-readable product handle, e.g. "summer-dress".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handle(String);

impl Handle {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let valid = !raw.is_empty()
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(QueryError::InvalidHandle(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetafieldUpdate {
    pub product: ProductId,
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub kind: String,
}

impl MetafieldUpdate {
    pub fn new(
        product_id: &str,
        namespace: &str,
        key: &str,
        value: &str,
        kind: &str,
    ) -> Result<Self, QueryError> {
        let product = ProductId::parse(product_id)?;
        for (field, v) in [("namespace", namespace), ("key", key), ("type", kind)] {
            if v.trim().is_empty() {
                return Err(QueryError::EmptyField(field));
            }
        }
        Ok(Self {
            product,
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            kind: kind.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    ListProducts,
    ProductById(ProductId),
    ProductByHandle(Handle),
    UpdateMetafield(MetafieldUpdate),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListProducts => "list_products",
            Operation::ProductById(_) => "product_by_id",
            Operation::ProductByHandle(_) => "product_by_handle",
            Operation::UpdateMetafield(_) => "update_metafield",
        }
    }

    // Mutations are never cached, so they have no key.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        match self {
            Operation::ListProducts => Some(ResourceKey::products()),
            Operation::ProductById(id) => Some(ResourceKey::product_by_id(id.as_str())),
            Operation::ProductByHandle(handle) => Some(ResourceKey::product_by_handle(handle.as_str())),
            Operation::UpdateMetafield(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamQuery {
    pub operation: &'static str,
    pub text: String,
}

pub struct QueryBuilder;

impl QueryBuilder {
    pub fn build(operation: &Operation) -> UpstreamQuery {
        let text = match operation {
            Operation::ListProducts => LIST_PRODUCTS.to_string(),
            Operation::ProductById(id) => {
                render(PRODUCT_BY_ID, &[("%PRODUCT_GID%", graphql_string(&id.gid()))])
            }
            Operation::ProductByHandle(handle) => {
                render(PRODUCT_BY_HANDLE, &[("%HANDLE%", graphql_string(handle.as_str()))])
            }
            Operation::UpdateMetafield(update) => render(
                UPDATE_METAFIELD,
                &[
                    ("%PRODUCT_GID%", graphql_string(&update.product.gid())),
                    ("%NAMESPACE%", graphql_string(&update.namespace)),
                    ("%KEY%", graphql_string(&update.key)),
                    ("%VALUE%", graphql_string(&update.value)),
                    ("%TYPE%", graphql_string(&update.kind)),
                ],
            ),
        };
        UpstreamQuery {
            operation: operation.name(),
            text,
        }
    }
}

// Single left-to-right pass: substituted values are never rescanned for markers.
fn render(template: &str, substitutions: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    loop {
        let next = substitutions
            .iter()
            .filter_map(|(marker, value)| rest.find(marker).map(|pos| (pos, *marker, value)))
            .min_by_key(|(pos, _, _)| *pos);
        match next {
            Some((pos, marker, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + marker.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

// Quoted GraphQL string literal with every structural character escaped.
pub fn graphql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const LIST_PRODUCTS: &str = r#"{
  products(first: 34) {
    edges {
      node {
        id
        title
        descriptionHtml
        vendor
        productType
        createdAt
        updatedAt
        handle
        tags
        status
        media(first: 10) {
          edges {
            node {
              mediaContentType
              alt
              ... on Model3d {
                id
                sources {
                  url
                  format
                  mimeType
                }
              }
              ... on MediaImage {
                image {
                  url
                  altText
                }
              }
            }
          }
        }
        options {
          id
          name
          position
          values
        }
        variants(first: 10) {
          edges {
            node {
              id
              title
              price
              compareAtPrice
              availableForSale
              selectedOptions {
                name
                value
              }
              sku
            }
          }
        }
      }
    }
  }
}"#;

const PRODUCT_BY_ID: &str = r#"{
  product(id: %PRODUCT_GID%) {
    id
    title
    handle
    descriptionHtml
    media(first: 5) {
      edges {
        node {
          mediaContentType
          alt
          ... on Model3d {
            id
            sources {
              url
              format
              mimeType
            }
          }
          ... on MediaImage {
            image {
              url
              altText
            }
          }
        }
      }
    }
    variants(first: 1) {
      edges {
        node {
          price
        }
      }
    }
    options {
      name
      values
    }
  }
}"#;

const PRODUCT_BY_HANDLE: &str = r#"{
  productByHandle(handle: %HANDLE%) {
    id
    title
    handle
    descriptionHtml
    media(first: 5) {
      edges {
        node {
          mediaContentType
          alt
          ... on Model3d {
            id
            sources {
              url
              format
              mimeType
            }
          }
          ... on MediaImage {
            image {
              url
              altText
            }
          }
        }
      }
    }
    variants(first: 1) {
      edges {
        node {
          price
        }
      }
    }
    options {
      name
      values
    }
  }
}"#;

const UPDATE_METAFIELD: &str = r#"mutation {
  productUpdate(
    input: {
      id: %PRODUCT_GID%,
      metafields: [
        {
          namespace: %NAMESPACE%,
          key: %KEY%,
          value: %VALUE%,
          type: %TYPE%
        }
      ]
    }
  ) {
    product {
      id
      handle
      title
      metafields(first: 30) {
        edges {
          node {
            id
            namespace
            key
            value
          }
        }
      }
    }
    userErrors {
      field
      message
    }
  }
}"#;
