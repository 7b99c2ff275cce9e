use serde::Serializer;
use serde::ser::SerializeMap;

pub fn serialize_properties_as_map<S>(properties: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(properties.len()))?;
    for (k, v) in properties {
        map.serialize_entry(k, v)?;
    }
    map.end()
}
