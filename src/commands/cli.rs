//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::backend::GalleryFilter;
use crate::billing::Tier;

#[derive(Parser, Debug)]
#[command(name = "costume-studio")]
#[command(version)]
#[command(about = "Turn photos into Halloween costume portraits and spooky videos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show token usage for the selected tier
    Usage {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Select the active tier (free, basic, pro, magic)
    Tier { tier: Tier },

    /// Clear the usage record (bonus tokens included)
    Reset,

    /// List costume presets
    Presets,

    /// Dress up a photo in a costume
    Transform(TransformArgs),

    /// Animate a photo into a short spooky video
    Video(VideoArgs),

    /// Print the checkout link for a tier or token pack
    Checkout {
        /// Tier (basic, pro, magic) or pack (small, medium, large)
        item: String,
    },

    /// Apply the result of a checkout return URL
    Redeem { url: String },

    /// Public gallery and weekly contest
    #[command(subcommand)]
    Gallery(GalleryCommand),

    /// Account sign-in
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Args, Debug, Clone)]
pub struct TransformArgs {
    /// Photo to transform
    pub image: PathBuf,

    /// Costume preset id (see `presets`) or free-form costume name
    #[arg(short, long, required_unless_present = "prompt")]
    pub costume: Option<String>,

    /// Custom costume description, used instead of a preset
    #[arg(short, long, conflicts_with = "costume")]
    pub prompt: Option<String>,

    /// Extra reference photos sent alongside the main one
    #[arg(long = "with")]
    pub extra_images: Vec<PathBuf>,

    /// Where to write the result (default: next to the photo)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VideoArgs {
    /// Photo to animate, usually a transformed one
    pub image: PathBuf,

    /// Costume preset id or name, used to theme the animation
    #[arg(short, long, required_unless_present = "prompt")]
    pub costume: Option<String>,

    /// Custom animation description
    #[arg(short, long, conflicts_with = "costume")]
    pub prompt: Option<String>,

    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum GalleryCommand {
    /// Browse public entries
    List {
        #[arg(short, long, default_value = "trending")]
        filter: GalleryFilter,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Vote for an entry
    Vote {
        id: String,
        /// Vote anonymously by IP instead of as the signed-in user
        #[arg(long)]
        ip: Option<String>,
    },

    /// Take back a vote
    Unvote {
        id: String,
        #[arg(long)]
        ip: Option<String>,
    },

    /// Upload a result and enter it into this week's contest
    Submit {
        file: PathBuf,
        #[arg(short, long)]
        costume: String,
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Current contest and its leaders
    Contest {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// All-time contest winners
    Winners {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Your own submissions
    Mine,

    /// Delete one of your submissions
    Delete { id: String },

    /// Report an entry to moderators
    Report {
        id: String,
        #[arg(short, long)]
        reason: String,
        #[arg(short, long)]
        details: Option<String>,
    },

    /// Gallery totals
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    SignUp {
        email: String,
        password: String,
        #[arg(short, long)]
        name: Option<String>,
    },
    SignIn {
        email: String,
        password: String,
    },
    /// Print the Google sign-in URL
    Google {
        #[arg(long, default_value = "http://localhost:3000/")]
        redirect_to: String,
    },
    Whoami,
    SignOut,
    ResetPassword {
        email: String,
        #[arg(long, default_value = "http://localhost:3000/reset-password")]
        redirect_to: String,
    },
}
