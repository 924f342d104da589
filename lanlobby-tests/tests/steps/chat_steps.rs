use cucumber::{then, when};
use lanlobby_tests::LobbyWorld;

#[when(expr = "guest {string} says {string}")]
async fn guest_says(world: &mut LobbyWorld, label: String, text: String) {
    let guest = world.guest_mut(&label);
    let result = guest.controller.send_chat(&text);
    guest.collect();
    world.last_result = Some(result);
    world.settle();
}

#[when(expr = "the host says {string}")]
async fn host_says(world: &mut LobbyWorld, text: String) {
    let host = world.host_mut();
    let result = host.controller.send_chat(&text);
    host.collect();
    world.last_result = Some(result);
    world.settle();
}

#[then(expr = "guest {string} hears {string} from {string}")]
async fn guest_hears(world: &mut LobbyWorld, label: String, text: String, sender: String) {
    let lines = world.guest(&label).chat_lines();
    assert!(
        lines.contains(&(sender, text)),
        "guest '{}' heard {:?}",
        label,
        lines
    );
}

#[then(expr = "the host hears {string} from {string}")]
async fn host_hears(world: &mut LobbyWorld, text: String, sender: String) {
    let lines = world.host().chat_lines();
    assert!(lines.contains(&(sender, text)), "host heard {:?}", lines);
}

#[then(expr = "guest {string} heard nothing")]
async fn guest_heard_nothing(world: &mut LobbyWorld, label: String) {
    assert!(world.guest(&label).chat_lines().is_empty());
}
