//! Editable texts: forum terms and e-mail templates.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Content;

pub const TERMS_AND_CONDS: &str = "terms";
pub const EMAIL_REGISTRATION: &str = "email-reg";
pub const EMAIL_PASSWORD: &str = "email-pass";
pub const EMAIL_REACTIVATION: &str = "email-react";
pub const EMAIL_NEW: &str = "email-new";
pub const EMAIL_SUBSCRIPTION: &str = "email-sub";

/// Texts seeded by the installer. `{forum}` and `{link}` are replaced when
/// a template is filled.
pub const DEFAULTS: &[(&str, &str, &str)] = &[
    (
        TERMS_AND_CONDS,
        "Forum Terms and Conditions",
        "Please remember that we are not responsible for any messages posted. \
         We do not vouch for or warrant the accuracy, completeness or usefulness of any post, \
         and are not responsible for the contents of any post.<br><br>\
         The posts express the views of the author of the post, not necessarily the views of this forum. \
         Any user who feels that a posted message is objectionable is encouraged to contact us immediately by email. \
         We have the ability to remove objectionable content and we will make every effort to do so, \
         within a reasonable time frame, if we determine that removal is necessary.<br><br>\
         You agree, through your use of this service, that you will not use this forum to post any material \
         which is knowingly false and/or defamatory, inaccurate, abusive, vulgar, hateful, harassing, obscene, \
         profane, sexually oriented, threatening, invasive of a person's privacy, or otherwise violative of any law.",
    ),
    (
        EMAIL_REGISTRATION,
        "Welcome to {forum}! This is your activation link",
        "<p>Thank you for registering at {forum}!</p>\
         <p>To activate your account open the following link in your Internet browser:<br>{link}<br></p>\
         <p>See you soon!<br>{forum}</p>",
    ),
    (
        EMAIL_PASSWORD,
        "{forum} password reset link",
        "<p>{forum} Password Reset</p>\
         <p>You are receiving this e-mail because someone has started the process of changing the account password at {forum}.<br>\
         If this person is you open the following link in your Internet browser and follow the instructions on screen.</p>\
         <p>{link}</p>\
         <p>If it was not you just ignore this e-mail.</p>\
         <p>Thank you!<br>{forum}</p>",
    ),
    (
        EMAIL_REACTIVATION,
        "{forum} account reactivation",
        "<p>{forum} Account Activation</p>\
         <p>You are receiving this e-mail because someone has started the process of activating the account at {forum}.<br>\
         If this person is you open the following link in your Internet browser and follow the instructions on screen.</p>\
         <p>{link}</p>\
         <p>If it was not you just ignore this e-mail.</p>\
         <p>Thank you!<br>{forum}</p>",
    ),
    (
        EMAIL_NEW,
        "New e-mail activation link at {forum}",
        "<p>{forum} New E-mail Address Activation</p>\
         <p>To activate your new e-mail address open the following link in your Internet browser and follow the instructions on screen.</p>\
         <p>{link}</p>\
         <p>Thank you<br>{forum}</p>",
    ),
    (
        EMAIL_SUBSCRIPTION,
        "New post in subscribed thread at {forum}",
        "<p>There has been new post added in the thread you are subscribing. Click the following link to read the thread.</p>\
         <p>{link}</p>\
         <p>See you soon!<br>{forum}</p>",
    ),
];

/// Inserts the default texts.
pub fn seed(conn: &Connection) -> rusqlite::Result<()> {
    let mut insert =
        conn.prepare("INSERT INTO content (name, topic, content) VALUES (?1, ?2, ?3)")?;
    for (name, topic, content) in DEFAULTS {
        insert.execute(params![name, topic, content])?;
    }
    Ok(())
}

/// Stored text, or the compiled-in default when the row is missing.
pub fn find(conn: &Connection, name: &str) -> rusqlite::Result<Option<Content>> {
    let stored = conn
        .query_row(
            "SELECT name, topic, content FROM content WHERE name = ?1",
            params![name],
            |row| {
                Ok(Content {
                    name: row.get(0)?,
                    topic: row.get(1)?,
                    content: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(stored.or_else(|| {
        DEFAULTS
            .iter()
            .find(|(key, _, _)| *key == name)
            .map(|(name, topic, content)| Content {
                name: name.to_string(),
                topic: topic.to_string(),
                content: content.to_string(),
            })
    }))
}

/// Replaces the `{forum}` and `{link}` placeholders in topic and body.
pub fn fill(template: &Content, forum: &str, link: &str) -> Content {
    let apply = |text: &str| text.replace("{forum}", forum).replace("{link}", link);
    Content {
        name: template.name.clone(),
        topic: apply(&template.topic),
        content: apply(&template.content),
    }
}
