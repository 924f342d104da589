use cucumber::{given, then, when};
use lanlobby_core::{HostSettings, JoinRequest, SessionEvent, SessionRole};
use lanlobby_tests::{LobbyWorld, HOST_IP};

// ===== Given Steps =====

#[given(expr = "a host {string} serving {string} for at most {int} members")]
async fn host_serving(world: &mut LobbyWorld, name: String, server_name: String, max: usize) {
    world.start_host(&name, &server_name, max).await;
    assert!(
        matches!(world.last_result, Some(Ok(()))),
        "host failed to start: {:?}",
        world.last_result
    );
}

#[given(expr = "a guest {string}")]
async fn a_guest(world: &mut LobbyWorld, label: String) {
    world.add_guest(&label);
}

#[given(expr = "guest {string} has joined as {string}")]
async fn guest_has_joined(world: &mut LobbyWorld, label: String, name: String) {
    world.add_guest(&label);
    guest_joins(world, label.clone(), name).await;
    assert_eq!(world.guest(&label).controller.role(), SessionRole::Connected);
}

// ===== When Steps =====

#[when(expr = "guest {string} joins as {string}")]
async fn guest_joins(world: &mut LobbyWorld, label: String, name: String) {
    world.join(&label, JoinRequest::new(name, HOST_IP, "25000"));
    world.settle();
}

#[when(expr = "guest {string} tries to join {string} port {string} as {string}")]
async fn guest_tries_to_join(
    world: &mut LobbyWorld,
    label: String,
    ip: String,
    port: String,
    name: String,
) {
    world.join(&label, JoinRequest::new(name, ip, port));
    world.settle();
}

#[when(expr = "the host tries to join as {string}")]
async fn host_tries_to_join(world: &mut LobbyWorld, name: String) {
    let host = world.host_mut();
    let result = host
        .controller
        .join_session(JoinRequest::new(name, HOST_IP, "25000"));
    host.collect();
    world.last_result = Some(result);
}

#[when(expr = "guest {string} tries to host {string}")]
async fn guest_tries_to_host(world: &mut LobbyWorld, label: String, server_name: String) {
    let guest = world.guest_mut(&label);
    let result = guest
        .controller
        .create_session(HostSettings::new(label.as_str(), server_name))
        .await;
    guest.collect();
    world.last_result = Some(result);
}

#[when("the host leaves the session")]
async fn host_leaves(world: &mut LobbyWorld) {
    let host = world.host_mut();
    host.controller.leave_session();
    host.collect();
    world.settle();
}

#[when(expr = "guest {string} leaves the session")]
async fn guest_leaves(world: &mut LobbyWorld, label: String) {
    let guest = world.guest_mut(&label);
    guest.controller.leave_session();
    guest.collect();
    world.settle();
}

#[when(expr = "guest {string} loses its connection")]
async fn guest_loses_connection(world: &mut LobbyWorld, label: String) {
    let id = world.guest(&label).id();
    world.network.sever(id);
    world.settle();
}

// ===== Then Steps =====

#[then(expr = "the host roster has {int} members")]
async fn host_roster_size(world: &mut LobbyWorld, count: usize) {
    let roster = world
        .host()
        .controller
        .roster()
        .expect("host should own a roster");
    assert_eq!(roster.len(), count);
}

#[then(expr = "the host lists guest {string} as {string}")]
async fn host_lists_guest(world: &mut LobbyWorld, label: String, name: String) {
    let id = world.guest(&label).id();
    let member = world
        .host()
        .controller
        .roster()
        .and_then(|roster| roster.get(id))
        .unwrap_or_else(|| panic!("guest '{}' is not on the roster", label));
    assert_eq!(member.display_name(), name);
}

#[then(expr = "the host no longer lists guest {string}")]
async fn host_no_longer_lists(world: &mut LobbyWorld, label: String) {
    let id = world.guest(&label).id();
    let roster = world
        .host()
        .controller
        .roster()
        .expect("host should own a roster");
    assert!(!roster.contains(id));
}

#[then(expr = "guest {string} is connected")]
async fn guest_is_connected(world: &mut LobbyWorld, label: String) {
    assert_eq!(world.guest(&label).controller.role(), SessionRole::Connected);
}

#[then(expr = "guest {string} is idle")]
async fn guest_is_idle(world: &mut LobbyWorld, label: String) {
    assert_eq!(world.guest(&label).controller.role(), SessionRole::Idle);
}

#[then("the host is idle")]
async fn host_is_idle(world: &mut LobbyWorld) {
    let host = world.host();
    assert_eq!(host.controller.role(), SessionRole::Idle);
    assert!(!host.controller.is_broadcasting());
}

#[then("the host is still hosting")]
async fn host_still_hosting(world: &mut LobbyWorld) {
    assert_eq!(world.host().controller.role(), SessionRole::Hosting);
}

#[then(expr = "guest {string} sees the notice {string}")]
async fn guest_sees_notice(world: &mut LobbyWorld, label: String, text: String) {
    let notices = world.guest(&label).notices();
    assert!(
        notices.iter().any(|notice| notice.contains(&text)),
        "no notice containing {:?} in {:?}",
        text,
        notices
    );
}

#[then(expr = "the host sees the notice {string}")]
async fn host_sees_notice(world: &mut LobbyWorld, text: String) {
    let notices = world.host().notices();
    assert!(
        notices.iter().any(|notice| notice.contains(&text)),
        "no notice containing {:?} in {:?}",
        text,
        notices
    );
}

#[then(expr = "guest {string} was disconnected because {string}")]
async fn guest_disconnected_because(world: &mut LobbyWorld, label: String, reason: String) {
    let reasons: Vec<String> = world
        .guest(&label)
        .events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Disconnected { reason } => Some(reason.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(reasons, vec![reason]);
}

#[then("the last request was rejected")]
async fn last_request_rejected(world: &mut LobbyWorld) {
    assert!(
        matches!(world.last_result, Some(Err(_))),
        "expected an error, got {:?}",
        world.last_result
    );
}
