use cucumber::{then, when};
use lanlobby_tests::LobbyWorld;

#[when("the host broadcasts the roster")]
async fn host_broadcasts(world: &mut LobbyWorld) {
    world.broadcast();
    assert!(
        world.last_listing.is_some(),
        "the host produced no listing"
    );
}

#[when(expr = "the host broadcasts {int} times")]
async fn host_broadcasts_repeatedly(world: &mut LobbyWorld, times: usize) {
    for _ in 0..times {
        world.broadcast();
    }
}

#[then(expr = "the listing header reads {string}")]
async fn listing_header(world: &mut LobbyWorld, header: String) {
    let first_line = world.last_listing().text().lines().next();
    assert_eq!(first_line, Some(header.as_str()));
}

#[then(expr = "the listing shows player {string}")]
async fn listing_shows_player(world: &mut LobbyWorld, name: String) {
    let text = world.last_listing().text();
    let named_rows = text
        .lines()
        .skip(3)
        .filter(|row| row.rsplit("\t\t").next() == Some(name.as_str()))
        .count();
    assert_eq!(named_rows, 1, "expected one row for {:?} in:\n{}", name, text);
}

#[then(expr = "the listing has {int} player rows")]
async fn listing_rows(world: &mut LobbyWorld, rows: usize) {
    let listing = world.last_listing();
    assert_eq!(listing.member_count(), rows);
    assert_eq!(listing.text().lines().skip(3).count(), rows);
}

#[then(expr = "guest {string} mirrors the host listing")]
async fn guest_mirrors_listing(world: &mut LobbyWorld, label: String) {
    let expected = world.last_listing().text().to_string();
    assert_eq!(world.guest(&label).mirror_text(), Some(expected));
}

#[then("every member shows the same roster")]
async fn every_member_converged(world: &mut LobbyWorld) {
    let expected = world.last_listing().text().to_string();
    assert_eq!(world.host().mirror_text().as_ref(), Some(&expected));

    for (label, guest) in world.guests.iter() {
        if !guest.controller.role().in_session() {
            continue;
        }
        assert_eq!(
            guest.mirror_text().as_ref(),
            Some(&expected),
            "guest '{}' diverged",
            label
        );
    }
}

#[then(expr = "guest {string} has no roster view")]
async fn guest_has_no_roster_view(world: &mut LobbyWorld, label: String) {
    let guest = world.guest(&label);
    assert_eq!(guest.mirror_text(), None);
    assert_eq!(guest.controller.mirror().member_count(), 0);
}
