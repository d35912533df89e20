//! Typed decoding of Query API XML responses.
//!
//! Elements are matched on their local name so namespaced responses decode
//! the same way as bare ones. Every record keeps the raw text of the fields it
//! carries; interpretation (dates, sizes, state codes) happens in the callers
//! so they can apply their own recovery rules.

use roxmltree::{Document, Node};

pub(crate) use roxmltree::Error as XmlError;

/// One `imagesSet/item` entry of a `DescribeImages` response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ImageRecord {
    pub(crate) image_id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) image_state: Option<String>,
    pub(crate) creation_date: Option<String>,
    pub(crate) tags: Vec<(String, String)>,
    pub(crate) volumes: Vec<VolumeRecord>,
}

/// One `blockDeviceMapping/item` entry of an image.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct VolumeRecord {
    pub(crate) device_name: Option<String>,
    pub(crate) snapshot_id: Option<String>,
    pub(crate) volume_size: Option<String>,
}

/// One `instancesSet/item` entry of a `DescribeInstances` response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct InstanceRecord {
    pub(crate) instance_id: Option<String>,
    pub(crate) state_code: Option<String>,
    pub(crate) vpc_id: Option<String>,
    pub(crate) availability_zone: Option<String>,
    pub(crate) tags: Vec<(String, String)>,
    pub(crate) private_ip: Option<String>,
    pub(crate) private_dns: Option<String>,
    pub(crate) public_ip: Option<String>,
    pub(crate) public_dns: Option<String>,
    pub(crate) ipv6: Vec<String>,
}

/// One `instancesSet/item` entry of a start/stop/reboot response.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct TransitionRecord {
    pub(crate) instance_id: Option<String>,
    pub(crate) previous_code: Option<String>,
    pub(crate) current_code: Option<String>,
}

/// Text of the first element named `name` anywhere in `response`.
pub(crate) fn first_text(response: &str, name: &str) -> Option<String> {
    let document = Document::parse(response).ok()?;
    document
        .descendants()
        .find(|node| is_named(*node, name))
        .and_then(|node| node.text())
        .map(str::to_owned)
}

/// Whether `response` exists and its first `return` element reads `true`.
pub(crate) fn is_return_true(response: Option<&str>) -> bool {
    response
        .and_then(|body| first_text(body, "return"))
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
}

/// Decodes the images of a `DescribeImages` response.
pub(crate) fn decode_images(response: &str) -> Result<Vec<ImageRecord>, XmlError> {
    let document = Document::parse(response)?;
    let root = document.root_element();
    if !is_named(root, "DescribeImagesResponse") {
        return Ok(Vec::new());
    }
    Ok(children(root, "imagesSet")
        .flat_map(|set| children(set, "item"))
        .map(image)
        .collect())
}

/// Decodes the instances of a `DescribeInstances` response.
pub(crate) fn decode_instances(response: &str) -> Result<Vec<InstanceRecord>, XmlError> {
    let document = Document::parse(response)?;
    let root = document.root_element();
    if !is_named(root, "DescribeInstancesResponse") {
        return Ok(Vec::new());
    }
    Ok(children(root, "reservationSet")
        .flat_map(|set| children(set, "item"))
        .flat_map(|reservation| children(reservation, "instancesSet"))
        .flat_map(|set| children(set, "item"))
        .map(instance)
        .collect())
}

/// Decodes the state transitions of a `*InstancesResponse`.
///
/// Anything that is not such a response, including unparsable text, yields no
/// transitions.
pub(crate) fn decode_transitions(response: &str) -> Vec<TransitionRecord> {
    let Ok(document) = Document::parse(response) else {
        return Vec::new();
    };
    let root = document.root_element();
    if !root.tag_name().name().contains("InstancesResponse") {
        return Vec::new();
    }
    children(root, "instancesSet")
        .flat_map(|set| children(set, "item"))
        .map(|item| TransitionRecord {
            instance_id: child_text(item, "instanceId"),
            previous_code: child(item, "previousState").and_then(|state| child_text(state, "code")),
            current_code: child(item, "currentState").and_then(|state| child_text(state, "code")),
        })
        .collect()
}

fn image(item: Node<'_, '_>) -> ImageRecord {
    ImageRecord {
        image_id: child_text(item, "imageId"),
        name: child_text(item, "name"),
        description: child_text(item, "description"),
        image_state: child_text(item, "imageState"),
        creation_date: child_text(item, "creationDate"),
        tags: tags(item),
        volumes: children(item, "blockDeviceMapping")
            .flat_map(|mapping| children(mapping, "item"))
            .map(|device| {
                let ebs = child(device, "ebs");
                VolumeRecord {
                    device_name: child_text(device, "deviceName"),
                    snapshot_id: ebs.and_then(|node| child_text(node, "snapshotId")),
                    volume_size: ebs.and_then(|node| child_text(node, "volumeSize")),
                }
            })
            .collect(),
    }
}

fn instance(item: Node<'_, '_>) -> InstanceRecord {
    InstanceRecord {
        instance_id: child_text(item, "instanceId"),
        state_code: child(item, "instanceState").and_then(|state| child_text(state, "code")),
        vpc_id: child_text(item, "vpcId"),
        availability_zone: child(item, "placement")
            .and_then(|placement| child_text(placement, "availabilityZone")),
        tags: tags(item),
        private_ip: child_text(item, "privateIpAddress"),
        private_dns: child_text(item, "privateDnsName"),
        public_ip: child_text(item, "ipAddress"),
        public_dns: child_text(item, "dnsName"),
        ipv6: children(item, "networkInterfaceSet")
            .flat_map(|set| children(set, "item"))
            .flat_map(|interface| children(interface, "ipv6AddressesSet"))
            .flat_map(|set| children(set, "item"))
            .filter_map(|address| child_text(address, "ipv6Address"))
            .collect(),
    }
}

fn tags(item: Node<'_, '_>) -> Vec<(String, String)> {
    children(item, "tagSet")
        .flat_map(|set| children(set, "item"))
        .filter_map(|tag| {
            let key = child_text(tag, "key")?;
            Some((key, child_text(tag, "value").unwrap_or_default()))
        })
        .collect()
}

fn is_named(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |child| is_named(*child, name))
}

fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .and_then(|element| element.text())
        .map(str::to_owned)
}
