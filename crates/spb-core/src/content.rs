//! Reply copy for the launchpad bot.
//!
//! All replies are static text plus one web-app button whose target is taken
//! from configuration, never from the request.

use url::Url;

use crate::messaging::types::{InlineButton, InlineKeyboard, OutgoingMessage};

pub const THROTTLED_NOTICE: &str = "⏳ Too many requests. Please wait a moment and try again.";

pub const GENERIC_FAILURE_NOTICE: &str =
    "❌ An unexpected error occurred. Please try again later or contact support if the issue persists.";

pub const LAUNCHPAD_BUTTON_LABEL: &str = "🚀 Open Launchpad";

#[derive(Clone, Copy, Debug)]
pub struct Tier {
    pub name: &'static str,
    pub price: &'static str,
    pub entitlement: &'static str,
    pub token_id: u32,
    pub max_supply: u32,
    pub description: &'static str,
}

pub const TIERS: [Tier; 3] = [
    Tier {
        name: "Commander",
        price: "$250",
        entitlement: "250,000 SUSU+",
        token_id: 5001,
        max_supply: 4500,
        description: "Entry-level Validator with Bronze Badge",
    },
    Tier {
        name: "Counsellor",
        price: "$750",
        entitlement: "750,000 SUSU+",
        token_id: 10001,
        max_supply: 400,
        description: "Mid-tier Validator with Silver Badge",
    },
    Tier {
        name: "Chancellor",
        price: "$2,500",
        entitlement: "2,500,000 SUSU+",
        token_id: 12001,
        max_supply: 100,
        description: "Premium Validator with Gold Badge",
    },
];

pub fn launchpad_keyboard(url: &Url) -> InlineKeyboard {
    InlineKeyboard::single(InlineButton {
        label: LAUNCHPAD_BUTTON_LABEL.to_string(),
        web_app: url.clone(),
    })
}

pub fn welcome(url: &Url) -> OutgoingMessage {
    let text = "🔥 Welcome to the Susumi Pioneer Validator Pre-Sale!

Mint your Commander, Counsellor, or Chancellor Pioneer NFTs directly here in Telegram.

These NFTs offer exclusive Pioneer Bonus Token Entitlements, Revenue Share and Governance Rights on Susumi.

Use the commands below to explore:

/tiers /price /supply /phase /mint

You are now part of the next evolution of Susumi!";

    OutgoingMessage::plain(text).with_keyboard(launchpad_keyboard(url))
}

pub fn tiers(url: &Url) -> OutgoingMessage {
    let mut text = String::from("🎯 **Pioneer Validator NFT Tiers**\n\n");
    for tier in &TIERS {
        text.push_str(&format!(
            "**{}**\n💰 Price: {}\n🎁 Entitlement: {}\n📦 Max Supply: {}\n📝 {}\n\n",
            tier.name, tier.price, tier.entitlement, tier.max_supply, tier.description
        ));
    }
    text.push_str("Use /mint to purchase NFTs or click the button below to open the launchpad.");

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}

pub fn price(url: &Url) -> OutgoingMessage {
    let mut text = String::from("💰 **Current NFT Prices**\n\n");
    for tier in &TIERS {
        text.push_str(&format!(
            "**{}**: {}\n   Entitlement: {}\n\n",
            tier.name, tier.price, tier.entitlement
        ));
    }
    text.push_str("💡 Prices are dynamic and may change based on supply milestones.");
    text.push_str("\n\nClick below to view real-time pricing in the launchpad.");

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}

pub fn supply(url: &Url) -> OutgoingMessage {
    let mut text = String::from("📈 **NFT Supply Information**\n\n");
    for tier in &TIERS {
        text.push_str(&format!(
            "**{}**\n📦 Max Supply: {}\n🆔 Token ID: {}\n\n",
            tier.name, tier.max_supply, tier.token_id
        ));
    }
    text.push_str("💡 Real-time supply data is available in the launchpad.");

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}

pub fn phase(url: &Url) -> OutgoingMessage {
    let text = "🎯 **Current Phase Information**

The launchpad uses a dynamic 4-phase pricing system:

**Phase 1 - Early Bird**
- Lowest prices
- Highest SUSU+ entitlements

**Phase 2 - Standard**
- Moderate pricing
- Good value

**Phase 3 - Advanced**
- Higher pricing
- Still competitive

**Phase 4 - Final Rush**
- Final pricing tier
- Last chance pricing

💡 Current phase depends on supply milestones for each tier.
📊 Check the launchpad for real-time phase information.";

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}

pub fn mint(url: &Url) -> OutgoingMessage {
    let text = "🚀 **Mint Pioneer Validator NFTs**

To mint your NFTs:

1️⃣ Click \"Open Launchpad\" below
2️⃣ Connect your wallet (MetaMask, Trust Wallet, etc.)
3️⃣ Select your desired tier (Commander, Counsellor, or Chancellor)
4️⃣ Choose quantity and payment method (USDT/USDC)
5️⃣ Complete the transaction

💡 All transactions are on-chain via Polygon network.
🔒 Your funds are secure - the bot never asks for your seed phrase.

Ready to mint? Click the button below!";

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}

pub fn help(url: &Url) -> OutgoingMessage {
    let text = "📚 **Susumi Pioneer Bot Commands**

**Available Commands:**
/tiers - View all NFT tiers and benefits
/price - Check current pricing
/supply - View supply information
/phase - Learn about pricing phases
/mint - Get instructions to mint NFTs
/help - Show this help message

**About Pioneer NFTs:**
• Utility NFTs with governance rights
• Revenue sharing from platform fees
• SUSU+ token entitlements
• Access to Validator Fund

**Security:**
✅ All purchases are on-chain via Polygon
✅ Bot never asks for seed phrases or private keys
✅ Connect wallet securely via WalletConnect

**Need Support?**
Visit https://susumi.io or use the launchpad for more information.";

    OutgoingMessage::markdown(text).with_keyboard(launchpad_keyboard(url))
}
