//! Prompt templates and costume presets

use serde::Serialize;

/// A ready-made costume the user can pick instead of writing a prompt
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostumePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
    pub prompt: &'static str,
}

pub const COSTUME_PRESETS: &[CostumePreset] = &[
    CostumePreset {
        id: "vampire",
        name: "Vampire",
        description: "Classic bloodsucker",
        emoji: "🧛",
        prompt: "Pale, fanged, dressed in a black cape and formal attire with slicked-back hair; red eyes and an alluring, sinister vibe.",
    },
    CostumePreset {
        id: "werewolf",
        name: "Werewolf",
        description: "Savage beast",
        emoji: "🐺",
        prompt: "Muscular, covered in fur, with wolf-like snout and claws poking through torn clothes; intense wild eyes.",
    },
    CostumePreset {
        id: "zombie",
        name: "Zombie",
        description: "Undead creature",
        emoji: "🧟",
        prompt: "Decayed skin, tattered clothing, exposed bone or wounds, shambling walk, with cold, dead eyes.",
    },
    CostumePreset {
        id: "grim_reaper",
        name: "Grim Reaper",
        description: "Death incarnate",
        emoji: "💀",
        prompt: "Skeletal figure in a flowing black hooded robe, holding a long, gleaming scythe, with empty eye sockets.",
    },
    CostumePreset {
        id: "headless_horseman",
        name: "Headless Horseman",
        description: "Haunted rider",
        emoji: "🎃",
        prompt: "Tall figure in colonial rider attire, neck stump with blood, carrying a glowing jack-o-lantern head.",
    },
    CostumePreset {
        id: "mummy",
        name: "Mummy",
        description: "Ancient undead",
        emoji: "🧟",
        prompt: "Draped head-to-toe in faded, aged bandages; bits of ancient jewelry; hollow, cursed stare.",
    },
    CostumePreset {
        id: "witch",
        name: "Witch",
        description: "Wicked spellcaster",
        emoji: "🧙",
        prompt: "Black pointed hat, long dark cloak, warty nose, crooked staff or broom, dark greenish skin, wicked grin.",
    },
    CostumePreset {
        id: "ghost",
        name: "Ghost",
        description: "Ethereal spirit",
        emoji: "👻",
        prompt: "Translucent flowing sheet-like form, featureless or shadowy face, edges trailing into mist.",
    },
    CostumePreset {
        id: "frankenstein",
        name: "Frankenstein's Monster",
        description: "Reanimated creature",
        emoji: "🧟",
        prompt: "Large, green-skinned with neck bolts and head scars, dressed in a ragged suit, stiff and towering posture.",
    },
    CostumePreset {
        id: "skeleton",
        name: "Skeleton",
        description: "Bone warrior",
        emoji: "💀",
        prompt: "Bodysuit or makeup showing white bones, black background, skull mask or face, bony hands.",
    },
    CostumePreset {
        id: "pumpkinhead",
        name: "Pumpkinhead",
        description: "Jack-o-lantern terror",
        emoji: "🎃",
        prompt: "Jack-o-lantern as a head with a creepy grin, vine-covered body, ragged scarecrow-like clothes.",
    },
    CostumePreset {
        id: "dracula",
        name: "Dracula",
        description: "Noble vampire lord",
        emoji: "🧛",
        prompt: "Elegant, with widow's-peak hair, formal Victorian suit, lined red-black cape, and pronounced fangs.",
    },
    CostumePreset {
        id: "evil_clown",
        name: "Evil Clown",
        description: "Sinister jester",
        emoji: "🤡",
        prompt: "White face paint, exaggerated mouth, wild-colored clown suit, bright wig, but evil and menacing.",
    },
    CostumePreset {
        id: "scarecrow",
        name: "Scarecrow",
        description: "Field guardian",
        emoji: "🌾",
        prompt: "Straw hat, stitched burlap sack mask, plaid shirt, trousers with straw stuffing spilling out.",
    },
];

/// Look up a preset by id (case-insensitive)
pub fn find_preset(id: &str) -> Option<&'static CostumePreset> {
    COSTUME_PRESETS
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}

/// Full instruction text for a costume transformation
pub fn build_transform_prompt(costume: &str) -> String {
    format!(
        r#"HALLOWEEN COSTUME TRANSFORMATION INSTRUCTIONS:

Create a realistic photo of the SAME PERSON wearing a Halloween costume.

IDENTITY PRESERVATION (MOST IMPORTANT):
- Keep the person's face, facial features, and body structure exactly the same
- Maintain skin tone, eye color, hair texture, age and build
- The person must be instantly recognizable as themselves

COSTUME:
Apply the following Halloween costume: {}
- Realistic costume clothing, makeup where the costume calls for it, and accessories
- Halloween-themed background elements if appropriate

PHOTO REALISM:
- Must look like a real photograph taken at a Halloween party
- Natural lighting, photo-realistic textures
- No cartoon, illustration, or artistic effects"#,
        costume.trim()
    )
}

/// Instruction text for animating a costume photo
pub fn build_video_prompt(costume: &str) -> String {
    format!(
        r#"HALLOWEEN VIDEO: {}.

Make this Halloween costume photo come alive for 3 seconds with spooky animation:
- Keep the person's face and identity exactly the same
- Subtle costume movement (cape fluttering, accessories moving)
- Character-appropriate gestures and atmospheric effects (fog, lightning, glowing eyes)
- Maintain realistic photo quality throughout"#,
        costume.trim()
    )
}
