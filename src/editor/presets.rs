/// Catalog entry tying a selectable option to its edit-instruction fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const BACKGROUND_OPTIONS: &[Preset] = &[
    Preset {
        id: "Keep Original BG",
        label: "Keep Original BG",
        prompt: "Keep Original Background. Fix shirt wrinkles. Refine hair and skin. Maintains the original shape of the face.",
    },
    Preset {
        id: "natural",
        label: "Natural",
        prompt: "Remove existing background and replace with a professional blurred natural background (garden or soft office window).",
    },
    Preset {
        id: "white",
        label: "White",
        prompt: "Remove background and replace with clean solid white color.",
    },
    Preset {
        id: "blue",
        label: "Blue",
        prompt: "Remove background and replace with specifically sky-blue shade #00a9ff for passport photos.",
    },
    Preset {
        id: "green",
        label: "Green",
        prompt: "Remove background and replace with solid light green color.",
    },
    Preset {
        id: "red",
        label: "Red",
        prompt: "Remove background and replace with solid deep red color.",
    },
    Preset {
        id: "red-gradient",
        label: "Red Gradient",
        prompt: "Remove background and replace with smooth red gradient (light coral to rose red).",
    },
    Preset {
        id: "blue-gradient",
        label: "Blue Gradient",
        prompt: "Remove background and replace with smooth blue gradient (sky blue to muted navy).",
    },
    Preset {
        id: "gray-gradient",
        label: "Gray Gradient",
        prompt: "Remove background and replace with smooth gray gradient (silver to dark charcoal).",
    },
];

pub const UNIFORM_PRESETS: &[Preset] = &[
    Preset {
        id: "none",
        label: "No Uniform / Custom Prompt",
        prompt: "",
    },
    Preset {
        id: "NO Replace New Shirt",
        label: "NOReplaceNewShirt",
        prompt: "Fix any wrinkles on the shirt. Balance and refine the hair. Ensure the final image is suitable for a student ID or passport photo. Keep shirt Style and Original Logo. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "jacket-office",
        label: "Jacket Office Uniform (Professional)",
        prompt: "Remove any existing logos. Replace the clothes with a modern, tailored business office jacket and matching shirt with a sharp collar. Ensure the shirt is clean and wrinkle-free, and the hair is professionally styled. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "men",
        label: "Men's Office Uniform (Shirt/Tie)",
        prompt: "Remove any logo from the shirt. Fix any wrinkles on the shirt. Balance and refine the hair. Add a blue tie and an office uniform jacket for a man. Ensure the shirt is a clean white, suitable for a professional setting. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "women",
        label: "Women's Office Uniform (Shirt)",
        prompt: "Remove any logo from the shirt. Fix any wrinkles on the shirt. Balance and refine the hair. Do not add a blue tie. Add an office uniform jacket for a woman. Ensure the shirt is a clean white, suitable for a professional setting. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "white-shirt",
        label: "White Shirt with Collar (Dress)",
        prompt: "Update the clothing to a new, crisp white dress shirt with a sharp, defined collar. Remove any logo, fix any wrinkles, and ensure the shirt fits well. Refine the hair and face for a polished professional look. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "student",
        label: "Student White Shirt Update",
        prompt: "Change the shirt to a new, crisp white student shirt, or update the existing white shirt to look new and clean. Fix any wrinkles on the shirt. Balance and refine the hair. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "tshirt-collar",
        label: "T-shirt with Collar (Polo)",
        prompt: "Replace the clothing with a clean, well-fitting polo shirt in a solid, neutral color (navy blue or black). Ensure the collar is neat and wrinkle-free. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "tshirt-random",
        label: "T-shirt with Collar (Random)",
        prompt: "Replace the clothing with a clean, well-fitting polo shirt in a random stylish pattern. Ensure the collar is neat and wrinkle-free. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "pattern-shirt",
        label: "Pattern Shirt with Collar",
        prompt: "Replace the clothing with a stylish button-down shirt featuring a subtle, modern pattern and sharp collar. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
    Preset {
        id: "normal-shirt",
        label: "Normal Plain Shirt (Casual)",
        prompt: "Replace the clothing with a simple, well-maintained, plain short-sleeve shirt in a solid color. Maintains the original shape of the face, adding radiance and even skin tone.",
    },
];

pub const STATE_UNIFORM_OPTIONS: &[Preset] = &[
    Preset {
        id: "none",
        label: "No Uniform Select",
        prompt: "",
    },
    Preset {
        id: "police",
        label: "Police uniforms",
        prompt: "-A professional portrait of a Cambodian National Police officer in official uniform. Tan/beige shirt with official police patches. Maintains original face shape and adds radiance.",
    },
    Preset {
        id: "teacher",
        label: "Teacher uniforms",
        prompt: "-A professional portrait of a Cambodian Teacher in official uniform. White button-up shirt with official blue epaulettes. Maintains original face shape and adds radiance.",
    },
    Preset {
        id: "land",
        label: "Land Officer uniforms",
        prompt: "-A professional portrait of a Cambodian Land Management officer in official uniform. Light beige or sky blue state uniform with ministry logo. Maintains original face shape and adds radiance.",
    },
    Preset {
        id: "district_city",
        label: "District/City officials",
        prompt: "-A professional portrait of a Cambodian District or City official. Official civil servant uniform with shoulder epaulettes. Maintains original face shape and adds radiance.",
    },
    Preset {
        id: "provincial",
        label: "Provincial officials",
        prompt: "-A professional portrait of a Cambodian Provincial official. Senior civil servant uniform with high quality gold epaulettes. Maintains original face shape and adds radiance.",
    },
];

pub const UNBLUR_PROMPT: &str = "Sharpen and enhance the details of this photo. Remove motion blur, grain, and noise. Increase the resolution and clarity for professional printing quality.";

pub const DEFAULT_MERGE_STYLE: &str = "Realistic, high quality, seamless blend";

pub const DEFAULT_VIDEO_PROMPT: &str = "A cinematic video of this subject";

pub fn find_preset(catalog: &'static [Preset], id: &str) -> Option<&'static Preset> {
    catalog.iter().find(|preset| preset.id == id)
}

/// Which clothing instruction drives the composed prompt. The editor offers
/// two catalogs (generic uniforms and state uniforms) but only one may be
/// active at a time; encoding the selection as one value makes it impossible
/// for both to be set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClothingSelection {
    #[default]
    None,
    Uniform(String),
    StateUniform(String),
}

impl ClothingSelection {
    /// Picking "none" in either catalog clears the selection entirely.
    pub fn uniform(id: &str) -> Self {
        if id == "none" {
            ClothingSelection::None
        } else {
            ClothingSelection::Uniform(id.to_string())
        }
    }

    pub fn state_uniform(id: &str) -> Self {
        if id == "none" {
            ClothingSelection::None
        } else {
            ClothingSelection::StateUniform(id.to_string())
        }
    }

    /// Uniform id as the selection controls see it ("none" when inactive).
    pub fn uniform_id(&self) -> &str {
        match self {
            ClothingSelection::Uniform(id) => id,
            _ => "none",
        }
    }

    pub fn state_uniform_id(&self) -> &str {
        match self {
            ClothingSelection::StateUniform(id) => id,
            _ => "none",
        }
    }

    fn fragment(&self) -> &'static str {
        let (catalog, id) = match self {
            ClothingSelection::None => return "",
            ClothingSelection::Uniform(id) => (UNIFORM_PRESETS, id),
            ClothingSelection::StateUniform(id) => (STATE_UNIFORM_OPTIONS, id),
        };
        find_preset(catalog, id).map(|preset| preset.prompt).unwrap_or("")
    }
}

/// Deterministically combines the background fragment and the active
/// clothing fragment into one edit instruction. Unknown ids resolve to
/// empty fragments; an entirely empty result is rejected later, at the
/// generation boundary, before any network call.
pub fn compose_prompt(background_id: &str, clothing: &ClothingSelection) -> String {
    let mut prompt = String::new();
    if let Some(background) = find_preset(BACKGROUND_OPTIONS, background_id) {
        if !background.prompt.is_empty() {
            prompt.push_str(background.prompt);
            prompt.push(' ');
        }
    }
    prompt.push_str(clothing.fragment());
    prompt.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_alone_when_no_clothing_selected() {
        let prompt = compose_prompt("white", &ClothingSelection::None);
        assert_eq!(
            prompt,
            "Remove background and replace with clean solid white color."
        );
    }

    #[test]
    fn background_and_uniform_join_with_single_space() {
        let prompt = compose_prompt("white", &ClothingSelection::uniform("men"));
        let men = find_preset(UNIFORM_PRESETS, "men").unwrap().prompt;
        assert_eq!(
            prompt,
            format!(
                "Remove background and replace with clean solid white color. {men}"
            )
        );
        assert!(!prompt.contains("  "));
    }

    #[test]
    fn state_uniform_wins_over_uniform_by_construction() {
        // Selecting a state uniform replaces any uniform selection; there is
        // no state where both ids are non-"none".
        let selection = ClothingSelection::state_uniform("police");
        assert_eq!(selection.uniform_id(), "none");
        assert_eq!(selection.state_uniform_id(), "police");

        let prompt = compose_prompt("blue", &selection);
        let police = find_preset(STATE_UNIFORM_OPTIONS, "police").unwrap().prompt;
        assert!(prompt.ends_with(police));
    }

    #[test]
    fn selecting_none_in_either_catalog_clears_the_selection() {
        assert_eq!(ClothingSelection::uniform("none"), ClothingSelection::None);
        assert_eq!(
            ClothingSelection::state_uniform("none"),
            ClothingSelection::None
        );
    }

    #[test]
    fn unknown_ids_compose_to_empty() {
        assert_eq!(
            compose_prompt("no-such-background", &ClothingSelection::uniform("no-such-uniform")),
            ""
        );
    }

    #[test]
    fn catalogs_lead_with_a_none_entry() {
        assert_eq!(UNIFORM_PRESETS[0].id, "none");
        assert_eq!(STATE_UNIFORM_OPTIONS[0].id, "none");
        assert!(UNIFORM_PRESETS[0].prompt.is_empty());
        assert!(STATE_UNIFORM_OPTIONS[0].prompt.is_empty());
    }
}
