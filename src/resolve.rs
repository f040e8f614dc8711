use crate::api::{BaseSpaceClient, Endpoint};
use crate::domain::Entity;
use crate::error::BsError;
use crate::schema::{self, NamedResource};

/// Looks up the display name of a sample or project.
pub fn resolve_name<C: BaseSpaceClient + ?Sized>(
    client: &C,
    entity: &Entity,
) -> Result<String, BsError> {
    let endpoint = match entity {
        Entity::Sample(id) => Endpoint::Sample(id.clone()),
        Entity::Project(id) => Endpoint::Project(id.clone()),
    };
    let body = client.fetch(&endpoint)?;
    let context = format!("{} {}", entity.kind(), entity.id());
    let resource: NamedResource = schema::decode_response(&context, &body)?;
    Ok(resource.name)
}
